//! Agent Society Simulation Engine
//!
//! A 2D world of autonomous agents that eat, work, farm, trade, mate and
//! occasionally steal, each choosing actions through a hybrid Q-learning /
//! neural-network brain. Economic, social and agricultural systems share one
//! bevy_ecs `World` and a spatial grid for every proximity query.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

pub mod actions;
pub mod brain;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod genetics;
pub mod navigation;
pub mod output;
pub mod persistence;
pub mod scheduler;
pub mod setup;
pub mod spatial;
pub mod store;
pub mod systems;

pub use components::*;
pub use config::SimConfig;
pub use error::{CheckpointError, ConfigError, SimError};
pub use scheduler::{SimCommand, Simulation, SimulationHandle, SpeedMode};
pub use spatial::SpatialGrid;
pub use store::ComponentStore;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Runs `f` with the world's generator temporarily taken out of the world,
/// so callers can hold `&mut World` and `&mut SmallRng` at once. The
/// generator is put back even if `f` panics. A world without a generator
/// gets a zero-seeded one.
pub fn with_rng<T>(world: &mut World, f: impl FnOnce(&mut World, &mut SmallRng) -> T) -> T {
    let mut rng = match world.remove_resource::<SimRng>() {
        Some(rng) => rng,
        None => {
            tracing::warn!("world has no SimRng, falling back to a zero-seeded generator");
            SimRng(SmallRng::seed_from_u64(0))
        }
    };
    let out = catch_unwind(AssertUnwindSafe(|| f(world, &mut rng.0)));
    world.insert_resource(rng);
    match out {
        Ok(out) => out,
        Err(payload) => resume_unwind(payload),
    }
}
