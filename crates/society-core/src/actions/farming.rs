//! Farming Actions
//!
//! Planting bare farms and harvesting ripe ones. `steal_crops` is the
//! illicit variant of harvesting that goes looking for other agents' crops.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::brain::{MemoryEntry, MemoryKind};
use crate::components::{BehaviorState, FarmPlot, Tag, Vitals};
use crate::systems::agriculture;

use super::action_constants::*;
use super::{
    approach, energy, genome_traits, nearby, now, position, recall, remember, set_behavior, wander,
    ActionOutcome,
};

pub mod farming_constants {
    pub const MIN_PLANT_ENERGY: f32 = 20.0;
    pub const MIN_HARVEST_ENERGY: f32 = 15.0;
    /// Energy per planting, scaled by metabolism
    pub const PLANT_ENERGY: f32 = 10.0;
    /// Energy per harvest, scaled by metabolism
    pub const HARVEST_ENERGY: f32 = 8.0;
    pub const PLANT_REWARD: f32 = 1.0;
    pub const FAILED_PENALTY: f32 = -0.2;
    pub const TIRED_PENALTY: f32 = -0.5;
    /// Harvest reward per unit of yield
    pub const YIELD_REWARD_DIVISOR: f32 = 50.0;
    pub const PLANTED_MEMORY: f32 = 0.7;
    pub const SPOTTED_FARM_MEMORY: f32 = 0.5;
    pub const HARVESTED_MEMORY: f32 = 0.8;
    pub const SPOTTED_YIELD_MEMORY: f32 = 0.6;
}

fn farm_memory(world: &mut World, agent: Entity, farm: Entity, kind: MemoryKind, importance: f32) {
    if let Some((x, y)) = position(world, farm) {
        let entry = MemoryEntry::new(kind, importance, now(world)).at(x, y);
        remember(world, agent, entry);
    }
}

fn pay_energy(world: &mut World, agent: Entity, base: f32) -> bool {
    let (_, metabolism, _) = genome_traits(world, agent);
    let cost = base * metabolism;
    match world.get_mut::<Vitals>(agent) {
        Some(mut vitals) if vitals.energy >= cost => {
            vitals.spend_energy(cost);
            true
        }
        _ => false,
    }
}

/// Sows the nearest bare farm, walking there first if needed.
pub fn plant<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    use farming_constants::*;
    if energy(world, agent) < MIN_PLANT_ENERGY {
        return ActionOutcome::reward(TIRED_PENALTY);
    }

    let farms = nearby(world, agent, FARM_RADIUS, Tag::Farm);
    let target = farms
        .iter()
        .find(|(f, _)| world.get::<FarmPlot>(*f).is_some_and(|p| p.is_tilth()))
        .or(farms.first())
        .copied();
    let Some((farm, distance)) = target else {
        return match recall(world, agent, MemoryKind::FoundFarm, 0.4) {
            Some(goal) => approach(world, agent, goal, 1.0, LONG_TRAVEL_PENALTY),
            None => wander(world, agent, rng, 20.0),
        };
    };
    if distance >= REACH_DISTANCE {
        farm_memory(world, agent, farm, MemoryKind::FoundFarm, SPOTTED_FARM_MEMORY);
        let Some(goal) = position(world, farm) else {
            return ActionOutcome::default();
        };
        return approach(world, agent, goal, 1.0, TRAVEL_PENALTY);
    }

    let ready = world.get::<FarmPlot>(farm).is_some_and(|p| p.is_tilth());
    if !ready || !pay_energy(world, agent, PLANT_ENERGY) {
        return ActionOutcome::reward(FAILED_PENALTY);
    }
    let planted = world
        .get_mut::<FarmPlot>(farm)
        .is_some_and(|mut p| p.plant(agent));
    if !planted {
        return ActionOutcome::reward(FAILED_PENALTY);
    }
    farm_memory(world, agent, farm, MemoryKind::FoundFarm, PLANTED_MEMORY);
    set_behavior(world, agent, BehaviorState::Planting { farm });
    ActionOutcome::reward(PLANT_REWARD)
}

/// Harvests a ripe farm in reach. Crops planted by someone else still get
/// taken, and count as theft.
pub fn harvest<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    harvest_with(world, agent, false, rng)
}

/// Like `harvest`, but only goes for crops planted by other agents.
pub fn steal_crops<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> ActionOutcome {
    harvest_with(world, agent, true, rng)
}

fn harvest_with<R: Rng>(world: &mut World, agent: Entity, steal: bool, rng: &mut R) -> ActionOutcome {
    use farming_constants::*;
    if energy(world, agent) < MIN_HARVEST_ENERGY {
        return ActionOutcome::reward(TIRED_PENALTY);
    }

    let farms = nearby(world, agent, FARM_RADIUS, Tag::Farm);
    let ripe: Vec<(Entity, f32)> = farms
        .iter()
        .copied()
        .filter(|(f, _)| {
            world.get::<FarmPlot>(*f).is_some_and(|p| {
                p.has_yield() && (!steal || p.planted_by.is_some_and(|owner| owner != agent))
            })
        })
        .collect();

    let Some(&(farm, distance)) = ripe.first() else {
        if let Some(&(farm, _)) = farms.first() {
            farm_memory(world, agent, farm, MemoryKind::FoundFarm, SPOTTED_FARM_MEMORY);
        }
        return match recall(world, agent, MemoryKind::FoundYieldFarm, YIELD_MEMORY_THRESHOLD) {
            Some(goal) if !steal => approach(world, agent, goal, 1.0, LONG_TRAVEL_PENALTY),
            _ => wander(world, agent, rng, 20.0),
        };
    };
    if distance >= REACH_DISTANCE {
        farm_memory(world, agent, farm, MemoryKind::FoundYieldFarm, SPOTTED_YIELD_MEMORY);
        let Some(goal) = position(world, farm) else {
            return ActionOutcome::default();
        };
        return approach(world, agent, goal, 1.0, TRAVEL_PENALTY);
    }

    if !pay_energy(world, agent, HARVEST_ENERGY) {
        return ActionOutcome::reward(TIRED_PENALTY);
    }
    let Some(yielded) = agriculture::harvest(world, farm, agent, rng) else {
        return ActionOutcome::reward(FAILED_PENALTY);
    };
    let stolen = yielded.planted_by.is_some_and(|owner| owner != agent);
    if stolen {
        set_behavior(world, agent, BehaviorState::Stealing { victim: farm });
        ActionOutcome::unethical(yielded.total_yield / YIELD_REWARD_DIVISOR)
    } else {
        farm_memory(world, agent, farm, MemoryKind::FoundYieldFarm, HARVESTED_MEMORY);
        set_behavior(world, agent, BehaviorState::Harvesting { farm });
        ActionOutcome::reward(yielded.total_yield / YIELD_REWARD_DIVISOR)
    }
}

/// Minimum importance for a remembered yield farm to be worth revisiting
const YIELD_MEMORY_THRESHOLD: f32 = 0.5;
