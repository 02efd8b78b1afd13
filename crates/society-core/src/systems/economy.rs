//! Economic System
//!
//! Periodic workplace bookkeeping: serve the customer queue, pay running
//! costs, split profit among investors and roll the dice on worker
//! misconduct.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::actions::{is_alive, money, now, remember};
use crate::brain::{MemoryEntry, MemoryKind};
use crate::components::economy_constants::FOOD_PER_PURCHASE;
use crate::components::{Investor, Reserves, Social, Vitals, Wallet, Workplace};
use crate::store::ComponentStore;

use super::social::{report, SocialEvent};

pub mod economy_system_constants {
    /// Agreeableness below which a worker may misbehave
    pub const MISCONDUCT_AGREEABLENESS: f32 = 0.3;
    pub const MISCONDUCT_SCALE: f32 = 0.5;
    pub const MIN_DAMAGE: f32 = 5.0;
    pub const MAX_DAMAGE: f32 = 20.0;
    pub const MISCONDUCT_MEMORY: f32 = 0.6;
    pub const MIN_PRODUCTIVITY: f32 = 0.5;
    /// Productivity regained per update after sabotage
    pub const PRODUCTIVITY_RECOVERY: f32 = 0.01;
}

/// What one economic update did across all workplaces
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EconomyUpdate {
    pub sales: u32,
    pub payouts: f32,
    pub incidents: u32,
}

/// Chance per update that a worker with this agreeableness misbehaves
pub fn misconduct_chance(agreeableness: f32) -> f32 {
    use economy_system_constants::*;
    ((MISCONDUCT_AGREEABLENESS - agreeableness) * MISCONDUCT_SCALE).max(0.0)
}

pub fn update_workplaces<R: Rng>(world: &mut World, rng: &mut R) -> EconomyUpdate {
    let mut update = EconomyUpdate::default();
    for workplace in world.entities_with::<With<Workplace>>() {
        if let Some(mut place) = world.get_mut::<Workplace>(workplace) {
            place.refresh_flags();
        }
        update.sales += serve_queue(world, workplace);
        update.payouts += settle_period(world, workplace);
        update.incidents += check_misconduct(world, workplace, rng);
    }
    update
}

/// Serves waiting customers in arrival order while there is staff and
/// stock. Customers who cannot pay the price leave the queue empty-handed.
fn serve_queue(world: &mut World, workplace: Entity) -> u32 {
    let mut sales = 0;
    loop {
        let (customer, price) = {
            let Some(mut place) = world.get_mut::<Workplace>(workplace) else {
                break;
            };
            if !place.has_staff || !place.has_stock {
                break;
            }
            match place.customer_queue.pop_front() {
                Some(customer) => (customer, place.price),
                None => break,
            }
        };
        if !is_alive(world, customer) || money(world, customer) < price {
            continue;
        }
        let paid = world
            .get_mut::<Wallet>(customer)
            .map_or(0.0, |mut w| w.withdraw(price));
        if let Some(mut reserves) = world.get_mut::<Reserves>(customer) {
            reserves.add_food(FOOD_PER_PURCHASE);
        }
        if let Some(mut place) = world.get_mut::<Workplace>(workplace) {
            place.take_inventory(1.0);
            place.capital += paid;
            place.revenue += paid;
        }
        sales += 1;
    }
    sales
}

/// Pays running costs, distributes profit to investors in proportion to
/// their stake and return rate, then opens a new period.
fn settle_period(world: &mut World, workplace: Entity) -> f32 {
    let payouts: Vec<(Entity, f32)> = {
        let Some(mut place) = world.get_mut::<Workplace>(workplace) else {
            return 0.0;
        };
        let costs = place.operating_costs;
        place.pay_out(costs);
        let profit = place.calculate_profit();
        place.productivity = (place.productivity + economy_system_constants::PRODUCTIVITY_RECOVERY).min(1.0);

        let staked: f32 = place.investors.iter().map(|s| s.amount).sum();
        let owed: Vec<(Entity, f32)> = if profit > 0.0 && staked > 0.0 {
            place
                .investors
                .iter()
                .map(|s| (s.investor, profit * (s.amount / staked) * s.return_rate))
                .collect()
        } else {
            Vec::new()
        };
        let paid = owed
            .into_iter()
            .map(|(investor, amount)| (investor, place.pay_out(amount)))
            .collect();
        place.close_period();
        place.refresh_flags();
        paid
    };

    let mut total = 0.0;
    for (investor, amount) in payouts {
        if let Some(mut wallet) = world.get_mut::<Wallet>(investor) {
            wallet.deposit(amount);
        }
        if let Some(mut ledger) = world.get_mut::<Investor>(investor) {
            ledger.total_returns += amount;
        }
        total += amount;
    }
    total
}

/// Disagreeable workers occasionally steal from the till or sabotage the
/// operation. Either way the incident is reported to the social system.
fn check_misconduct<R: Rng>(world: &mut World, workplace: Entity, rng: &mut R) -> u32 {
    use economy_system_constants::*;
    let workers = match world.get::<Workplace>(workplace) {
        Some(place) => place.workers.clone(),
        None => return 0,
    };

    let mut incidents = 0;
    for worker in workers {
        if !is_alive(world, worker) {
            continue;
        }
        let agreeableness = world.get::<Social>(worker).map_or(0.5, |s| s.agreeableness);
        if rng.gen::<f32>() >= misconduct_chance(agreeableness) {
            continue;
        }
        let damage = rng.gen_range(MIN_DAMAGE..=MAX_DAMAGE);
        let theft = rng.gen_bool(0.5);

        let stolen = match world.get_mut::<Workplace>(workplace) {
            Some(mut place) if theft => place.pay_out(damage),
            Some(mut place) => {
                place.productivity = (place.productivity * (1.0 - damage / 100.0)).max(MIN_PRODUCTIVITY);
                0.0
            }
            None => continue,
        };
        if stolen > 0.0 {
            if let Some(mut wallet) = world.get_mut::<Wallet>(worker) {
                wallet.deposit(stolen);
            }
        }
        if let Some(mut vitals) = world.get_mut::<Vitals>(worker) {
            vitals.update_corruption(true);
        }
        let entry = MemoryEntry::new(MemoryKind::CommittedMisconduct, MISCONDUCT_MEMORY, now(world)).about(workplace);
        remember(world, worker, entry);
        report(
            world,
            SocialEvent::Misconduct {
                employee: worker,
                workplace,
                theft,
                damage,
            },
        );
        tracing::debug!(worker = ?worker, workplace = ?workplace, theft, damage, "workplace misconduct");
        incidents += 1;
    }
    incidents
}
