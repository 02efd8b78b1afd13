//! Personal Actions
//!
//! Eating, resting and searching: actions that need no partner.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::components::economy_constants::FOOD_COST;
use crate::components::{BehaviorState, FoodItem, Reserves, Tag, Vitals, Wallet};
use crate::navigation::move_randomly;
use crate::store::ComponentStore;

use super::action_constants::*;
use super::{approach, food, genome_traits, money, nearby, position, set_behavior, wander, ActionOutcome};

pub mod personal_constants {
    pub const BROKE_PENALTY: f32 = -0.5;
    pub const EXPLORATION_VALUE: f32 = 0.2;
    /// Age at which the exploration bonus has halved
    pub const EXPLORATION_HALF_AGE: f32 = 50.0;
    pub const REST_REWARD_DIVISOR: f32 = 20.0;
}

/// Eats from reserves first, otherwise buys the nearest food item lying
/// in the world.
pub fn eat<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    let (stamina, _, _) = genome_traits(world, agent);

    if food(world, agent) > 0.0 {
        let eaten = world
            .get_mut::<Reserves>(agent)
            .map_or(0.0, |mut r| r.remove_food(EAT_PORTION));
        if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
            vitals.gain_energy(eaten * stamina);
        }
        set_behavior(world, agent, BehaviorState::Eating);
        return ActionOutcome::reward(eaten / 10.0);
    }

    if money(world, agent) < FOOD_COST {
        return ActionOutcome::reward(personal_constants::BROKE_PENALTY);
    }

    let Some(&(item, distance)) = nearby(world, agent, FOOD_RADIUS, Tag::Food).first() else {
        return wander(world, agent, rng, 10.0);
    };
    if distance >= EAT_DISTANCE {
        let Some(goal) = position(world, item) else {
            return ActionOutcome::default();
        };
        return approach(world, agent, goal, EAT_APPROACH_SPEED, TRAVEL_PENALTY);
    }

    let nutrition = world.get::<FoodItem>(item).map_or(0.0, |f| f.nutrition);
    if let Some(mut wallet) = world.get_mut::<Wallet>(agent) {
        wallet.withdraw(FOOD_COST);
    }
    if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
        vitals.gain_energy(nutrition * stamina);
    }
    world.remove_entity(item);
    set_behavior(world, agent, BehaviorState::Eating);
    ActionOutcome::reward(nutrition / 10.0)
}

/// Recovers energy in proportion to stamina.
pub fn rest(world: &mut World, agent: Entity) -> ActionOutcome {
    let (stamina, _, _) = genome_traits(world, agent);
    let gained = match world.get_mut::<Vitals>(agent) {
        Some(mut vitals) => {
            let before = vitals.energy;
            vitals.gain_energy(stamina);
            vitals.energy - before
        }
        None => 0.0,
    };
    set_behavior(world, agent, BehaviorState::Resting);
    ActionOutcome::reward(gained / personal_constants::REST_REWARD_DIVISOR)
}

/// Random walk with an exploration bonus that fades with age.
pub fn search<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use personal_constants::*;
    let age = world.get::<Vitals>(agent).map_or(0, |v| v.age);
    let cost = move_randomly(world, agent, rng);
    set_behavior(world, agent, BehaviorState::Searching);
    let exploration = EXPLORATION_VALUE / (1.0 + age as f32 / EXPLORATION_HALF_AGE);
    ActionOutcome::reward(exploration - cost / 20.0 - cost / 10.0)
}
