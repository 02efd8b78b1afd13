//! Social Actions
//!
//! Mating, gifts and agent-to-agent trades, plus the revenge acts an agent
//! carries out against someone it holds a grudge against. Outcomes are
//! reported to the social system, which adjusts trust on both sides.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind, InteractionKind};

use crate::brain::{Brain, MemoryEntry, MemoryKind};
use crate::components::economy_constants::{TRADE_FOOD_PRICE, TRADE_MONEY_RATE};
use crate::components::{BehaviorState, Reserves, Social, Tag, Vitals, Wallet};
use crate::events::logger::{entity_id, record_event};
use crate::genetics::{attempt_reproduction, is_compatible_mate, select_mate, Genome, Suitor};
use crate::systems::social::{report, SocialEvent};

use super::action_constants::*;
use super::{approach, energy, food, money, nearby, now, position, remember, set_behavior, wander, ActionOutcome};

pub mod social_action_constants {
    pub const BIRTH_REWARD: f32 = 5.0;
    pub const BONDING_REWARD: f32 = 2.0;
    pub const MATE_MEMORY: f32 = 0.7;
    pub const MIN_GIFT_FOOD: f32 = 5.0;
    pub const GIFT_FOOD_PORTION: f32 = 20.0;
    pub const MIN_GIFT_MONEY: f32 = 10.0;
    pub const GIFT_MONEY_PORTION: f32 = 10.0;
    pub const GIFT_REWARD: f32 = 0.5;
    pub const MIN_TRADE_FOOD: f32 = 10.0;
    pub const MIN_TRADE_MONEY: f32 = 10.0;
    pub const TRADE_PORTION: f32 = 20.0;
    pub const TRADE_REWARD: f32 = 0.6;
    pub const TRADE_MEMORY: f32 = 0.7;
    pub const SHORT_PENALTY: f32 = -0.2;
    pub const NOTHING_TO_TRADE_PENALTY: f32 = -0.3;
    /// Disagreeable traders may short-change their partner
    pub const SCAM_AGREEABLENESS: f32 = 0.3;
    pub const SCAM_CHANCE: f64 = 0.4;
    pub const MIN_SCAM_RATIO: f32 = 0.2;
    pub const REVENGE_TAKE: f32 = 10.0;
    pub const REVENGE_SEVERITY: f32 = 0.5;
    pub const VIOLENCE_ENERGY: f32 = 5.0;
}

fn free_space(world: &World, agent: Entity) -> f32 {
    world
        .get::<Reserves>(agent)
        .map_or(0.0, |r| (r.max_food - r.food).max(0.0))
}

fn move_food(world: &mut World, from: Entity, to: Entity, amount: f32) -> f32 {
    let amount = amount.min(free_space(world, to));
    let taken = world
        .get_mut::<Reserves>(from)
        .map_or(0.0, |mut r| r.remove_food(amount));
    if let Some(mut reserves) = world.get_mut::<Reserves>(to) {
        reserves.add_food(taken);
    }
    taken
}

fn move_money(world: &mut World, from: Entity, to: Entity, amount: f32) -> f32 {
    let taken = world
        .get_mut::<Wallet>(from)
        .map_or(0.0, |mut w| w.withdraw(amount));
    if let Some(mut wallet) = world.get_mut::<Wallet>(to) {
        wallet.deposit(taken);
    }
    taken
}

fn interaction(world: &mut World, actor: Entity, target: Entity, kind: InteractionKind) {
    report(
        world,
        SocialEvent::Interaction {
            actor,
            target,
            kind,
            successful: true,
        },
    );
}

/// Nearest living agent in gift and trade range, walking toward it if it
/// is not yet close enough. `Err` carries the outcome of that fallback.
fn partner_in_reach<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> Result<Entity, ActionOutcome> {
    let Some(&(partner, distance)) = nearby(world, agent, AGENT_RADIUS, Tag::Agent).first() else {
        return Err(wander(world, agent, rng, 20.0));
    };
    if distance >= HANDOFF_DISTANCE {
        let outcome = match position(world, partner) {
            Some(goal) => approach(world, agent, goal, 1.0, TRAVEL_PENALTY),
            None => ActionOutcome::default(),
        };
        return Err(outcome);
    }
    Ok(partner)
}

/// Courts the most attractive compatible agent nearby and tries to
/// conceive with them.
pub fn mate<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use social_action_constants::*;
    let candidates = nearby(world, agent, MATE_RADIUS, Tag::Agent);
    let chosen = {
        let Some(own) = world.get::<Genome>(agent) else {
            return ActionOutcome::default();
        };
        let own_energy = energy(world, agent);
        let compatible: Vec<(Entity, &Genome)> = candidates
            .iter()
            .filter_map(|&(candidate, _)| {
                let genome = world.get::<Genome>(candidate)?;
                let suitor = Suitor::new(genome, energy(world, candidate));
                is_compatible_mate(Suitor::new(own, own_energy), suitor, rng).then_some((candidate, genome))
            })
            .collect();
        select_mate(own, &compatible)
    };
    let Some(partner) = chosen else {
        return wander(world, agent, rng, 10.0);
    };

    let child = attempt_reproduction(world, agent, partner, rng);
    let time = now(world);
    if let Some(mut brain) = world.get_mut::<Brain>(agent) {
        brain.record_social(partner, InteractionKind::Mate, child.is_some(), MATE_MEMORY);
        brain.remember(MemoryEntry::new(MemoryKind::PreferredMate, MATE_MEMORY, time).about(partner));
    }
    interaction(world, agent, partner, InteractionKind::Mate);
    set_behavior(world, agent, BehaviorState::Mating { partner });
    if child.is_some() {
        ActionOutcome::reward(BIRTH_REWARD)
    } else {
        ActionOutcome::reward(BONDING_REWARD)
    }
}

pub fn gift_food<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use social_action_constants::*;
    if food(world, agent) <= MIN_GIFT_FOOD {
        return ActionOutcome::reward(SHORT_PENALTY);
    }
    let partner = match partner_in_reach(world, agent, rng) {
        Ok(partner) => partner,
        Err(outcome) => return outcome,
    };
    let given = move_food(world, agent, partner, GIFT_FOOD_PORTION);
    finish_gift(world, agent, partner, given, "food")
}

pub fn gift_money<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use social_action_constants::*;
    if money(world, agent) < MIN_GIFT_MONEY {
        return ActionOutcome::reward(SHORT_PENALTY);
    }
    let partner = match partner_in_reach(world, agent, rng) {
        Ok(partner) => partner,
        Err(outcome) => return outcome,
    };
    let given = move_money(world, agent, partner, GIFT_MONEY_PORTION);
    finish_gift(world, agent, partner, given, "money")
}

fn finish_gift(world: &mut World, agent: Entity, partner: Entity, given: f32, what: &str) -> ActionOutcome {
    if given <= 0.0 {
        return ActionOutcome::reward(social_action_constants::SHORT_PENALTY);
    }
    interaction(world, agent, partner, InteractionKind::Gift);
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Gift)
            .with_actor(entity_id(agent))
            .with_target(entity_id(partner))
            .with_amount(given)
            .with_detail(what)
    });
    set_behavior(world, agent, BehaviorState::Gifting { target: partner });
    ActionOutcome::reward(social_action_constants::GIFT_REWARD)
}

fn remember_partner(world: &mut World, agent: Entity, partner: Entity) {
    let time = now(world);
    let mut entry = MemoryEntry::new(MemoryKind::TradingPartner, social_action_constants::TRADE_MEMORY, time)
        .about(partner);
    if let Some((x, y)) = position(world, partner) {
        entry = entry.at(x, y);
    }
    remember(world, agent, entry);
}

fn log_trade(world: &mut World, agent: Entity, partner: Entity, food: f32, money: f32) {
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Trade)
            .with_actor(entity_id(agent))
            .with_target(entity_id(partner))
            .with_amount(food)
            .with_detail(format!("{money:.2} money"))
    });
}

/// Sells up to `TRADE_PORTION` food to the nearest agent at 0.6 money per
/// unit, capped at what the buyer can pay.
pub fn trade_food_for_money<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use social_action_constants::*;
    if food(world, agent) < MIN_TRADE_FOOD {
        return ActionOutcome::reward(NOTHING_TO_TRADE_PENALTY);
    }
    let partner = match partner_in_reach(world, agent, rng) {
        Ok(partner) => partner,
        Err(outcome) => return outcome,
    };
    let buyer_money = money(world, partner);
    if buyer_money < MIN_TRADE_MONEY {
        return ActionOutcome::reward(SHORT_PENALTY);
    }

    let amount = food(world, agent).min(TRADE_PORTION).min(free_space(world, partner));
    if amount <= 0.0 {
        return ActionOutcome::reward(SHORT_PENALTY);
    }
    let price = (amount * TRADE_FOOD_PRICE).min(buyer_money);
    let moved = move_food(world, agent, partner, amount);
    let paid = move_money(world, partner, agent, price);

    interaction(world, agent, partner, InteractionKind::Trade);
    remember_partner(world, agent, partner);
    log_trade(world, agent, partner, moved, paid);
    set_behavior(world, agent, BehaviorState::Trading { partner });
    ActionOutcome::reward(TRADE_REWARD)
}

/// Buys food from the nearest agent at 1.5 food per unit of money.
/// Disagreeable buyers sometimes pay less than agreed.
pub fn trade_money_for_food<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    buy_from_agent(world, agent, false, rng)
}

/// A money-for-food trade where the buyer always short-changes the seller.
pub fn scam_trade<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    buy_from_agent(world, agent, true, rng)
}

fn buy_from_agent<R: Rng>(world: &mut World, agent: Entity, force_scam: bool, rng: &mut R) -> ActionOutcome {
    use social_action_constants::*;
    if money(world, agent) < MIN_TRADE_MONEY {
        return ActionOutcome::reward(NOTHING_TO_TRADE_PENALTY);
    }
    let partner = match partner_in_reach(world, agent, rng) {
        Ok(partner) => partner,
        Err(outcome) => return outcome,
    };
    let seller_food = food(world, partner);
    if seller_food < MIN_TRADE_FOOD {
        return ActionOutcome::reward(SHORT_PENALTY);
    }

    let offer = money(world, agent).min(TRADE_PORTION);
    let amount = (offer * TRADE_MONEY_RATE)
        .min(seller_food)
        .min(free_space(world, agent));
    if amount <= 0.0 {
        return ActionOutcome::reward(SHORT_PENALTY);
    }
    let promised = amount / TRADE_MONEY_RATE;

    let agreeableness = world
        .get::<Social>(agent)
        .map_or(0.5, |s| s.agreeableness);
    let scam = force_scam || (agreeableness < SCAM_AGREEABLENESS && rng.gen_bool(SCAM_CHANCE));
    let ratio = if scam {
        (1.0 - agreeableness).max(MIN_SCAM_RATIO)
    } else {
        0.0
    };

    let moved = move_food(world, partner, agent, amount);
    let paid = move_money(world, agent, partner, promised * (1.0 - ratio));
    set_behavior(world, agent, BehaviorState::Trading { partner });
    log_trade(world, agent, partner, moved, paid);

    if scam {
        report(
            world,
            SocialEvent::Scam {
                scammer: agent,
                victim: partner,
                promised,
                actual: paid,
            },
        );
        return ActionOutcome::unethical(TRADE_REWARD + (promised - paid) / 10.0);
    }
    interaction(world, agent, partner, InteractionKind::Trade);
    remember_partner(world, agent, partner);
    ActionOutcome::reward(TRADE_REWARD)
}

/// Pays back a wrong in kind: theft for theft, violence for violence, a
/// worthless trade for a scam.
pub fn execute_revenge(world: &mut World, agent: Entity, target: Entity, kind: InteractionKind) -> ActionOutcome {
    use social_action_constants::*;
    let outcome = match kind {
        InteractionKind::Theft => {
            let amount = move_money(world, target, agent, REVENGE_TAKE);
            report(
                world,
                SocialEvent::Theft {
                    thief: agent,
                    victim: target,
                    amount,
                },
            );
            set_behavior(world, agent, BehaviorState::Stealing { victim: target });
            ActionOutcome::unethical(amount / 10.0)
        }
        InteractionKind::ScamTrade => {
            let amount = move_money(world, target, agent, REVENGE_TAKE);
            if amount > 0.0 {
                report(
                    world,
                    SocialEvent::Scam {
                        scammer: agent,
                        victim: target,
                        promised: amount,
                        actual: 0.0,
                    },
                );
            }
            set_behavior(world, agent, BehaviorState::Trading { partner: target });
            ActionOutcome::unethical(amount / 10.0)
        }
        _ => {
            if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
                vitals.spend_energy(VIOLENCE_ENERGY);
            }
            report(
                world,
                SocialEvent::Violence {
                    attacker: agent,
                    victim: target,
                    severity: REVENGE_SEVERITY,
                },
            );
            set_behavior(world, agent, BehaviorState::Fighting { victim: target });
            ActionOutcome::unethical(REVENGE_SEVERITY / 2.0)
        }
    };
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Revenge)
            .with_actor(entity_id(agent))
            .with_target(entity_id(target))
            .with_detail(kind.name())
    });
    tracing::debug!(avenger = ?agent, target = ?target, kind = kind.name(), "revenge taken");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::genetics::Gender;
    use crate::systems::social::SocialEvents;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_successful_trade_food_for_money() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        set_food(&mut world, a, 20.0);
        set_money(&mut world, a, 0.0);
        set_money(&mut world, b, 50.0);

        let outcome = trade_food_for_money(&mut world, a, &mut rng);
        assert_eq!(outcome.reward, 0.6);
        assert!((money(&world, a) - 12.0).abs() < 1e-5);
        assert_eq!(food(&world, b), 20.0);
        assert_eq!(food(&world, a), 0.0);
        assert!((money(&world, b) - 38.0).abs() < 1e-5);
    }

    #[test]
    fn test_trade_price_capped_at_buyer_money() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        set_food(&mut world, a, 40.0);
        set_money(&mut world, b, 10.0);

        trade_food_for_money(&mut world, a, &mut rng);
        assert_eq!(money(&world, b), 0.0);
        assert_eq!(money(&world, a), 60.0);
        assert_eq!(food(&world, b), 20.0);
    }

    #[test]
    fn test_trade_walks_toward_distant_partner() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        agent(&mut world, (140.0, 100.0), Gender::Female);
        set_food(&mut world, a, 20.0);
        assert_eq!(trade_food_for_money(&mut world, a, &mut rng).reward, -0.1);
        assert_eq!(food(&world, a), 20.0);
    }

    #[test]
    fn test_honest_money_for_food_trade() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        world.get_mut::<Social>(a).unwrap().agreeableness = 0.9;
        set_food(&mut world, b, 60.0);

        let outcome = trade_money_for_food(&mut world, a, &mut rng);
        assert!(!outcome.unethical);
        assert_eq!(food(&world, a), 30.0);
        assert_eq!(money(&world, a), 30.0);
        assert_eq!(money(&world, b), 70.0);
    }

    #[test]
    fn test_scam_trade_short_changes_seller() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        world.get_mut::<Social>(a).unwrap().agreeableness = 0.5;
        set_food(&mut world, b, 60.0);

        let outcome = scam_trade(&mut world, a, &mut rng);
        assert!(outcome.unethical);
        assert_eq!(food(&world, a), 30.0);
        // Half of the agreed 20 is withheld.
        assert!((money(&world, b) - 60.0).abs() < 1e-4);
        assert_eq!(world.resource::<SocialEvents>().len(), 1);
    }

    #[test]
    fn test_gift_food_moves_portion() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        set_food(&mut world, a, 30.0);
        assert_eq!(gift_food(&mut world, a, &mut rng).reward, 0.5);
        assert_eq!(food(&world, a), 10.0);
        assert_eq!(food(&world, b), 20.0);
    }

    #[test]
    fn test_gift_respects_recipient_capacity() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        set_food(&mut world, a, 30.0);
        set_food(&mut world, b, 95.0);
        gift_food(&mut world, a, &mut rng);
        assert_eq!(food(&world, a), 25.0);
        assert_eq!(food(&world, b), 100.0);
    }

    #[test]
    fn test_gift_money_needs_funds() {
        let mut rng = SmallRng::seed_from_u64(8);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        agent(&mut world, (110.0, 100.0), Gender::Female);
        set_money(&mut world, a, 5.0);
        assert_eq!(gift_money(&mut world, a, &mut rng).reward, -0.2);
    }

    #[test]
    fn test_mate_alone_wanders() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        assert!(mate(&mut world, a, &mut rng).reward < 0.0);
    }

    #[test]
    fn test_revenge_theft_takes_money() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        let outcome = execute_revenge(&mut world, a, b, InteractionKind::Theft);
        assert!(outcome.unethical);
        assert_eq!(money(&world, a), 60.0);
        assert_eq!(money(&world, b), 40.0);
        assert_eq!(world.resource::<SocialEvents>().len(), 1);
    }
}
