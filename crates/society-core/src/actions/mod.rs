//! Agent Actions
//!
//! One function per action. Targeted actions share a protocol: look for
//! candidates of the right tag within a radius, wander if there are none,
//! walk toward the nearest one if it is out of reach, and otherwise run the
//! transaction. Every function returns an `ActionOutcome`; the behavior
//! system turns the reward into mood, corruption and learning.

pub mod farming;
pub mod personal;
pub mod social;
pub mod work;

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::ActionKind;

use crate::brain::{Brain, MemoryEntry, MemoryKind};
use crate::components::{BehaviorState, Reserves, SimClock, Tag, Transform, Vitals, Wallet};
use crate::genetics::Genome;
use crate::navigation::{move_randomly, navigate_to};
use crate::spatial::query_by_tag;

/// Search radii, reach distances and reward constants for actions
pub mod action_constants {
    pub const FOOD_RADIUS: f32 = 100.0;
    pub const EAT_DISTANCE: f32 = 10.0;
    pub const EAT_PORTION: f32 = 30.0;
    pub const EAT_APPROACH_SPEED: f32 = 1.2;
    pub const WORK_RADIUS: f32 = 200.0;
    pub const FARM_RADIUS: f32 = 150.0;
    pub const MATE_RADIUS: f32 = 150.0;
    /// Radius for gifts and trades
    pub const AGENT_RADIUS: f32 = 50.0;
    /// Radius for investing, buying and selling
    pub const MARKET_RADIUS: f32 = 100.0;
    /// Distance at which farms and workplaces can be used
    pub const REACH_DISTANCE: f32 = 20.0;
    /// Distance at which goods change hands between agents
    pub const HANDOFF_DISTANCE: f32 = 15.0;
    pub const TRAVEL_PENALTY: f32 = -0.1;
    pub const LONG_TRAVEL_PENALTY: f32 = -0.2;
}

/// Result of running one action
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionOutcome {
    pub reward: f32,
    /// Theft, scams and other acts that raise corruption
    pub unethical: bool,
}

impl ActionOutcome {
    pub fn reward(reward: f32) -> Self {
        Self {
            reward,
            unethical: false,
        }
    }

    pub fn unethical(reward: f32) -> Self {
        Self {
            reward,
            unethical: true,
        }
    }
}

/// Runs `action` for `agent`. Dead or incomplete agents do nothing.
pub fn execute_action<R: Rng>(
    world: &mut World,
    agent: Entity,
    action: ActionKind,
    rng: &mut R,
) -> ActionOutcome {
    if !is_alive(world, agent) || world.get::<Transform>(agent).is_none() {
        return ActionOutcome::default();
    }
    match action {
        ActionKind::Eat => personal::eat(world, agent, rng),
        ActionKind::Rest => personal::rest(world, agent),
        ActionKind::Search => personal::search(world, agent, rng),
        ActionKind::Work => work::work(world, agent, rng),
        ActionKind::Invest => work::invest(world, agent, rng),
        ActionKind::BuyFood => work::buy_food(world, agent, rng),
        ActionKind::SellFood => work::sell_food(world, agent, rng),
        ActionKind::PlantFood => farming::plant(world, agent, rng),
        ActionKind::HarvestFood => farming::harvest(world, agent, rng),
        ActionKind::StealCrops => farming::steal_crops(world, agent, rng),
        ActionKind::Mate => social::mate(world, agent, rng),
        ActionKind::GiftFood => social::gift_food(world, agent, rng),
        ActionKind::GiftMoney => social::gift_money(world, agent, rng),
        ActionKind::TradeFoodForMoney => social::trade_food_for_money(world, agent, rng),
        ActionKind::TradeMoneyForFood => social::trade_money_for_food(world, agent, rng),
        ActionKind::ScamTrade => social::scam_trade(world, agent, rng),
    }
}

pub fn is_alive(world: &World, entity: Entity) -> bool {
    world.get::<Vitals>(entity).is_some_and(|v| v.alive)
}

pub fn position(world: &World, entity: Entity) -> Option<(f32, f32)> {
    world.get::<Transform>(entity).map(|t| t.position())
}

/// Simulated time used to stamp memories and relationships
pub fn now(world: &World) -> f32 {
    world.get_resource::<SimClock>().map_or(0.0, |c| c.time)
}

pub fn energy(world: &World, agent: Entity) -> f32 {
    world.get::<Vitals>(agent).map_or(0.0, |v| v.energy)
}

pub fn money(world: &World, agent: Entity) -> f32 {
    world.get::<Wallet>(agent).map_or(0.0, |w| w.money)
}

pub fn food(world: &World, agent: Entity) -> f32 {
    world.get::<Reserves>(agent).map_or(0.0, |r| r.food)
}

pub(crate) fn genome_traits(world: &World, agent: Entity) -> (f32, f32, f32) {
    world
        .get::<Genome>(agent)
        .map_or((1.0, 1.0, 0.5), |g| (g.stamina, g.metabolism, g.learning_capacity))
}

/// Entities tagged `tag` around `agent`, nearest first, excluding the agent
/// itself and any agent that has already died this tick.
pub fn nearby(world: &World, agent: Entity, radius: f32, tag: Tag) -> Vec<(Entity, f32)> {
    let Some((x, y)) = position(world, agent) else {
        return Vec::new();
    };
    query_by_tag(world, x, y, radius, tag)
        .into_iter()
        .filter(|(e, _)| *e != agent)
        .filter(|(e, _)| tag != Tag::Agent || is_alive(world, *e))
        .collect()
}

pub fn set_behavior(world: &mut World, agent: Entity, state: BehaviorState) {
    if let Some(mut behavior) = world.get_mut::<BehaviorState>(agent) {
        *behavior = state;
    }
}

/// Files an episodic memory for agents that have a brain.
pub fn remember(world: &mut World, agent: Entity, entry: MemoryEntry) {
    if let Some(mut brain) = world.get_mut::<Brain>(agent) {
        brain.remember(entry);
    }
}

/// Position of the most important remembered place of `kind`
pub fn recall(world: &World, agent: Entity, kind: MemoryKind, min_importance: f32) -> Option<(f32, f32)> {
    let brain = world.get::<Brain>(agent)?;
    brain
        .episodic
        .get(kind, min_importance)
        .into_iter()
        .find_map(|m| m.position)
}

/// Random step used when nothing suitable is in range.
pub(crate) fn wander<R: Rng>(world: &mut World, agent: Entity, rng: &mut R, divisor: f32) -> ActionOutcome {
    let cost = move_randomly(world, agent, rng);
    set_behavior(world, agent, BehaviorState::Searching);
    ActionOutcome::reward(-cost / divisor)
}

/// One step toward `goal` for a fixed travel reward.
pub(crate) fn approach(world: &mut World, agent: Entity, goal: (f32, f32), speed: f32, reward: f32) -> ActionOutcome {
    navigate_to(world, agent, goal, speed);
    set_behavior(world, agent, BehaviorState::Moving { destination: goal });
    ActionOutcome::reward(reward)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::SimConfig;
    use crate::genetics::Gender;
    use crate::setup::{insert_resources, spawn_agent, AgentSpec};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    pub fn world() -> World {
        let mut world = World::new();
        insert_resources(&mut world, &SimConfig::default());
        world
    }

    /// An agent with unit stamina and metabolism and a brain.
    pub fn agent(world: &mut World, at: (f32, f32), gender: Gender) -> Entity {
        let mut rng = SmallRng::seed_from_u64(at.0.to_bits() as u64 ^ at.1.to_bits() as u64);
        let mut genome = Genome::random_with_gender(gender, &mut rng);
        genome.stamina = 1.0;
        genome.metabolism = 1.0;
        genome.learning_capacity = 0.5;
        genome.use_neural_network = true;
        spawn_agent(
            world,
            AgentSpec {
                genome,
                position: at,
                money: 50.0,
                generation: 0,
            },
            &mut rng,
        )
    }

    pub fn set_money(world: &mut World, agent: Entity, money: f32) {
        world.get_mut::<Wallet>(agent).unwrap().money = money;
    }

    pub fn set_food(world: &mut World, agent: Entity, food: f32) {
        world.get_mut::<Reserves>(agent).unwrap().food = food;
    }

    pub fn set_energy(world: &mut World, agent: Entity, energy: f32) {
        world.get_mut::<Vitals>(agent).unwrap().energy = energy;
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::genetics::Gender;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_dead_agents_do_nothing() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        world.get_mut::<Vitals>(a).unwrap().alive = false;
        for action in ActionKind::all() {
            let outcome = execute_action(&mut world, a, *action, &mut rng);
            assert_eq!(outcome, ActionOutcome::default());
        }
        assert_eq!(world.get::<Transform>(a).unwrap().position(), (100.0, 100.0));
    }

    #[test]
    fn test_nearby_skips_self_and_dead() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        let c = agent(&mut world, (105.0, 100.0), Gender::Female);
        world.get_mut::<Vitals>(c).unwrap().alive = false;
        let found = nearby(&world, a, 50.0, Tag::Agent);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, b);
    }

    #[test]
    fn test_every_action_keeps_balances_non_negative() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (105.0, 100.0), Gender::Female);
        crate::setup::spawn_farm(&mut world, (110.0, 100.0));
        crate::setup::spawn_workplace(&mut world, (95.0, 100.0));
        for round in 0..40 {
            for action in ActionKind::all() {
                let actor = if round % 2 == 0 { a } else { b };
                execute_action(&mut world, actor, *action, &mut rng);
                for e in [a, b] {
                    assert!(money(&world, e) >= 0.0);
                    let r = world.get::<Reserves>(e).unwrap();
                    assert!(r.food >= 0.0 && r.food <= r.max_food);
                }
            }
        }
    }
}
