//! Workplace Actions
//!
//! Working for wages, investing, and buying or selling food at the
//! counter. Every transfer is clamped to what the paying side holds.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind, InteractionKind};

use crate::brain::{MemoryEntry, MemoryKind};
use crate::components::economy_constants::*;
use crate::components::vital_constants::STARVING_ENERGY;
use crate::components::{BehaviorState, Investor, Reserves, Tag, Vitals, Wallet, Workplace};
use crate::events::logger::{entity_id, record_event};
use crate::systems::social::{report, SocialEvent};

use super::action_constants::*;
use super::{
    approach, energy, food, genome_traits, money, nearby, now, position, recall, remember,
    set_behavior, wander, ActionOutcome,
};

pub mod work_constants {
    pub const EXHAUSTED_PENALTY: f32 = -1.0;
    pub const REJECTED_PENALTY: f32 = -0.5;
    /// Energy spent per shift, scaled by metabolism
    pub const SHIFT_ENERGY: f32 = 15.0;
    /// Share of the base wage paid per shift
    pub const WAGE_SHARE: f32 = 0.1;
    pub const WORKPLACE_MEMORY_BASE: f32 = 0.4;
    pub const MIN_INVESTMENT: f32 = 20.0;
    pub const INVESTMENT_MEMORY: f32 = 0.7;
    pub const POOR_PENALTY: f32 = -0.2;
    pub const INVEST_REWARD: f32 = 0.3;
    pub const BUY_REWARD: f32 = 0.4;
    pub const OUT_OF_STOCK_PENALTY: f32 = -0.3;
    pub const MIN_SELL_FOOD: f32 = 10.0;
    pub const SELL_PORTION: f32 = 30.0;
    /// Food units per unit of workplace stock
    pub const FOOD_PER_STOCK: f32 = 10.0;
    /// Capital a workplace needs before it buys food
    pub const MIN_BUYER_CAPITAL: f32 = 10.0;
    pub const SELL_REWARD: f32 = 0.5;
    pub const NO_FUNDS_PENALTY: f32 = -0.2;
}

fn nearest_workplace(world: &World, agent: Entity, radius: f32) -> Option<(Entity, f32)> {
    nearby(world, agent, radius, Tag::Workplace).first().copied()
}

/// Walks toward a workplace that is out of reach.
fn approach_workplace(world: &mut World, agent: Entity, workplace: Entity, reward: f32) -> ActionOutcome {
    match position(world, workplace) {
        Some(goal) => approach(world, agent, goal, 1.0, reward),
        None => ActionOutcome::default(),
    }
}

/// A shift at the nearest workplace: hire on if needed, spend energy, get
/// paid out of the workplace's capital.
pub fn work<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use work_constants::*;
    if energy(world, agent) < STARVING_ENERGY {
        return ActionOutcome::reward(EXHAUSTED_PENALTY);
    }

    let Some((workplace, distance)) = nearest_workplace(world, agent, WORK_RADIUS) else {
        return match recall(world, agent, MemoryKind::FoundWorkplace, WORKPLACE_MEMORY_BASE) {
            Some(goal) => approach(world, agent, goal, 1.0, LONG_TRAVEL_PENALTY),
            None => wander(world, agent, rng, 20.0),
        };
    };
    if distance >= REACH_DISTANCE {
        return approach_workplace(world, agent, workplace, LONG_TRAVEL_PENALTY);
    }

    let hired = world
        .get_mut::<Workplace>(workplace)
        .is_some_and(|mut w| w.hire(agent));
    if !hired {
        return ActionOutcome::reward(REJECTED_PENALTY);
    }

    let (_, metabolism, learning) = genome_traits(world, agent);
    let shift_cost = SHIFT_ENERGY * metabolism;
    if energy(world, agent) < shift_cost {
        return ActionOutcome::reward(REJECTED_PENALTY);
    }
    if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
        vitals.spend_energy(shift_cost);
    }

    let (paid, colleague) = match world.get_mut::<Workplace>(workplace) {
        Some(mut w) => {
            let wage = w.base_wage * WAGE_SHARE * (1.0 + learning / 2.0) * w.productivity;
            let paid = w.pay_out(wage);
            w.record_wage(agent, paid);
            let colleague = w.workers.iter().copied().find(|c| *c != agent);
            (paid, colleague)
        }
        None => (0.0, None),
    };
    if let Some(mut wallet) = world.get_mut::<Wallet>(agent) {
        wallet.deposit(paid);
    }

    if let Some((x, y)) = position(world, workplace) {
        let importance = (WORKPLACE_MEMORY_BASE + paid / 20.0).min(1.0);
        let entry = MemoryEntry::new(MemoryKind::FoundWorkplace, importance, now(world)).at(x, y);
        remember(world, agent, entry);
    }
    if let Some(colleague) = colleague {
        report(
            world,
            SocialEvent::Interaction {
                actor: agent,
                target: colleague,
                kind: InteractionKind::Work,
                successful: true,
            },
        );
    }
    set_behavior(world, agent, BehaviorState::Working { workplace });
    ActionOutcome::reward(paid / 10.0)
}

/// Puts up to `MAX_INVESTMENT` into the nearest workplace for a share of
/// its profits.
pub fn invest<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use work_constants::*;
    if money(world, agent) < MIN_INVESTMENT {
        return ActionOutcome::reward(POOR_PENALTY);
    }
    let Some((workplace, distance)) = nearest_workplace(world, agent, MARKET_RADIUS) else {
        return wander(world, agent, rng, 20.0);
    };
    if distance >= REACH_DISTANCE {
        return approach_workplace(world, agent, workplace, TRAVEL_PENALTY);
    }
    if world.get::<Workplace>(workplace).is_none() {
        return ActionOutcome::default();
    }

    let amount = world
        .get_mut::<Wallet>(agent)
        .map_or(0.0, |mut w| w.withdraw(MAX_INVESTMENT));
    let worker = match world.get_mut::<Workplace>(workplace) {
        Some(mut w) => {
            w.add_stake(agent, amount, INVESTMENT_RETURN_RATE);
            w.workers.iter().copied().find(|c| *c != agent)
        }
        None => None,
    };
    if let Some(mut investor) = world.get_mut::<Investor>(agent) {
        investor.record(workplace, amount, INVESTMENT_RETURN_RATE);
    }

    if let Some((x, y)) = position(world, workplace) {
        let entry = MemoryEntry::new(MemoryKind::FoundWorkplace, INVESTMENT_MEMORY, now(world)).at(x, y);
        remember(world, agent, entry);
    }
    if let Some(worker) = worker {
        report(
            world,
            SocialEvent::Interaction {
                actor: agent,
                target: worker,
                kind: InteractionKind::Invest,
                successful: true,
            },
        );
    }
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Investment)
            .with_actor(entity_id(agent))
            .with_target(entity_id(workplace))
            .with_amount(amount)
    });
    set_behavior(world, agent, BehaviorState::Investing { workplace });
    ActionOutcome::reward(INVEST_REWARD)
}

/// Buys one unit of stock at the counter. An empty shelf puts the agent in
/// the workplace's customer queue instead.
pub fn buy_food<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use work_constants::*;
    if money(world, agent) < FOOD_COST {
        return ActionOutcome::reward(-0.5);
    }
    let Some((workplace, distance)) = nearest_workplace(world, agent, MARKET_RADIUS) else {
        return wander(world, agent, rng, 20.0);
    };
    if distance >= REACH_DISTANCE {
        return approach_workplace(world, agent, workplace, TRAVEL_PENALTY);
    }

    let sold = match world.get_mut::<Workplace>(workplace) {
        Some(mut w) if w.inventory >= 1.0 => {
            w.take_inventory(1.0);
            w.capital += FOOD_COST;
            w.revenue += FOOD_COST;
            true
        }
        Some(mut w) => {
            w.enqueue_customer(agent);
            false
        }
        None => return ActionOutcome::default(),
    };
    set_behavior(world, agent, BehaviorState::Shopping { workplace });
    if !sold {
        return ActionOutcome::reward(OUT_OF_STOCK_PENALTY);
    }

    if let Some(mut wallet) = world.get_mut::<Wallet>(agent) {
        wallet.withdraw(FOOD_COST);
    }
    if let Some(mut reserves) = world.get_mut::<Reserves>(agent) {
        reserves.add_food(FOOD_PER_PURCHASE);
    }
    ActionOutcome::reward(BUY_REWARD)
}

/// Sells up to `SELL_PORTION` food to the nearest workplace, which turns it
/// into stock.
pub fn sell_food<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use work_constants::*;
    let available = food(world, agent);
    if available < MIN_SELL_FOOD {
        return ActionOutcome::reward(OUT_OF_STOCK_PENALTY);
    }
    let Some((workplace, distance)) = nearest_workplace(world, agent, MARKET_RADIUS) else {
        return wander(world, agent, rng, 20.0);
    };
    if distance >= REACH_DISTANCE {
        return approach_workplace(world, agent, workplace, TRAVEL_PENALTY);
    }

    let amount = available.min(SELL_PORTION);
    let price = match world.get_mut::<Workplace>(workplace) {
        Some(mut w) if w.capital >= MIN_BUYER_CAPITAL => {
            let paid = w.pay_out(amount * SELL_PRICE_PER_UNIT);
            w.add_inventory(amount / FOOD_PER_STOCK);
            paid
        }
        Some(_) => return ActionOutcome::reward(NO_FUNDS_PENALTY),
        None => return ActionOutcome::default(),
    };
    if let Some(mut reserves) = world.get_mut::<Reserves>(agent) {
        reserves.remove_food(amount);
    }
    if let Some(mut wallet) = world.get_mut::<Wallet>(agent) {
        wallet.deposit(price);
    }
    set_behavior(world, agent, BehaviorState::Selling { workplace });
    ActionOutcome::reward(SELL_REWARD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::brain::Brain;
    use crate::genetics::Gender;
    use crate::setup::spawn_workplace;
    use crate::systems::social::SocialEvents;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_work_pays_wage_from_capital() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let wp = spawn_workplace(&mut world, (110.0, 100.0));

        let outcome = work(&mut world, a, &mut rng);
        // 10 * 0.1 * (1 + 0.25)
        assert!((outcome.reward - 0.125).abs() < 1e-5);
        assert!((money(&world, a) - 51.25).abs() < 1e-4);
        assert_eq!(energy(&world, a), 85.0);
        let w = world.get::<Workplace>(wp).unwrap();
        assert!(w.employs(a));
        assert!((w.capital - (STARTING_CAPITAL - 1.25)).abs() < 1e-3);
        assert!(world
            .get::<Brain>(a)
            .unwrap()
            .episodic
            .has(MemoryKind::FoundWorkplace, 0.4));
    }

    #[test]
    fn test_work_exhausted() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        set_energy(&mut world, a, 10.0);
        assert_eq!(work(&mut world, a, &mut rng).reward, -1.0);
    }

    #[test]
    fn test_full_workplace_rejects() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let wp = spawn_workplace(&mut world, (105.0, 100.0));
        {
            let mut w = world.get_mut::<Workplace>(wp).unwrap();
            w.max_workers = 0;
        }
        assert_eq!(work(&mut world, a, &mut rng).reward, -0.5);
    }

    #[test]
    fn test_colleagues_build_work_relationships() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (102.0, 100.0), Gender::Female);
        spawn_workplace(&mut world, (110.0, 100.0));
        work(&mut world, a, &mut rng);
        work(&mut world, b, &mut rng);
        assert_eq!(world.resource::<SocialEvents>().len(), 1);
    }

    #[test]
    fn test_invest_moves_money_into_stake() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        set_money(&mut world, a, 80.0);
        let wp = spawn_workplace(&mut world, (110.0, 100.0));

        let outcome = invest(&mut world, a, &mut rng);
        assert_eq!(outcome.reward, 0.3);
        assert_eq!(money(&world, a), 30.0);
        let w = world.get::<Workplace>(wp).unwrap();
        assert_eq!(w.investors.len(), 1);
        assert_eq!(w.investors[0].amount, 50.0);
        assert_eq!(w.capital, STARTING_CAPITAL + 50.0);
        assert_eq!(world.get::<Investor>(a).unwrap().total_invested(), 50.0);
    }

    #[test]
    fn test_buy_food_from_stock_or_queue() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let wp = spawn_workplace(&mut world, (110.0, 100.0));
        world.get_mut::<Workplace>(wp).unwrap().take_inventory(MAX_INVENTORY - 1.0);

        assert_eq!(buy_food(&mut world, a, &mut rng).reward, 0.4);
        assert_eq!(money(&world, a), 45.0);
        assert_eq!(food(&world, a), 30.0);

        assert_eq!(buy_food(&mut world, a, &mut rng).reward, -0.3);
        assert_eq!(money(&world, a), 45.0);
        let w = world.get::<Workplace>(wp).unwrap();
        assert_eq!(w.customer_queue.front(), Some(&a));
    }

    #[test]
    fn test_sell_food_converts_to_stock() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        set_food(&mut world, a, 40.0);
        let wp = spawn_workplace(&mut world, (110.0, 100.0));
        world.get_mut::<Workplace>(wp).unwrap().inventory = 0.0;

        assert_eq!(sell_food(&mut world, a, &mut rng).reward, 0.5);
        assert_eq!(food(&world, a), 10.0);
        assert_eq!(money(&world, a), 65.0);
        assert_eq!(world.get::<Workplace>(wp).unwrap().inventory, 3.0);
    }

    #[test]
    fn test_sell_food_needs_funded_buyer() {
        let mut rng = SmallRng::seed_from_u64(8);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        set_food(&mut world, a, 40.0);
        let wp = spawn_workplace(&mut world, (110.0, 100.0));
        world.get_mut::<Workplace>(wp).unwrap().capital = 5.0;

        assert_eq!(sell_food(&mut world, a, &mut rng).reward, -0.2);
        assert_eq!(food(&world, a), 40.0);
    }
}
