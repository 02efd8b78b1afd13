//! Navigation
//!
//! Moves agents one step per call, either in a random direction or toward a
//! goal. Every step costs `speed * metabolism * 0.5` energy, keeps the
//! agent inside the world and updates its grid cell.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;

use crate::components::{Transform, Vitals, WorldBounds};
use crate::genetics::Genome;
use crate::spatial::SpatialGrid;

pub mod navigation_constants {
    pub const RANDOM_SPEED: (f32, f32) = (0.5, 1.5);
    pub const TARGET_SPEED: f32 = 2.0;
    pub const ENERGY_PER_SPEED: f32 = 0.5;
    /// Within this distance an agent slows to half speed
    pub const ARRIVAL_SLOWDOWN: f32 = 10.0;
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn body(world: &World, agent: Entity) -> Option<(f32, f32)> {
    world.get::<Genome>(agent).map(|g| (g.stamina, g.metabolism))
}

/// Applies the velocity, clamps to bounds, charges energy and keeps the
/// grid in sync. Returns the energy cost.
fn step(world: &mut World, agent: Entity, vx: f32, vy: f32, speed: f32, metabolism: f32) -> f32 {
    let bounds = world.get_resource::<WorldBounds>().copied();
    let (x, y) = {
        let Some(mut transform) = world.get_mut::<Transform>(agent) else {
            return 0.0;
        };
        let (mut x, mut y) = (transform.x + vx, transform.y + vy);
        if let Some(bounds) = bounds {
            (x, y) = bounds.clamp(x, y);
        }
        transform.x = x;
        transform.y = y;
        transform.vx = vx;
        transform.vy = vy;
        (x, y)
    };

    if let Some(mut grid) = world.get_resource_mut::<SpatialGrid>() {
        grid.update(agent, x, y);
    }

    let cost = speed * metabolism * navigation_constants::ENERGY_PER_SPEED;
    if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
        vitals.spend_energy(cost);
    }
    cost
}

/// One step in a random direction. Returns the energy spent.
pub fn move_randomly<R: Rng>(world: &mut World, agent: Entity, rng: &mut R) -> f32 {
    use navigation_constants::*;
    let Some((stamina, metabolism)) = body(world, agent) else {
        return 0.0;
    };
    if world.get::<Transform>(agent).is_none() {
        return 0.0;
    }
    let angle = rng.gen_range(0.0..TAU);
    let speed = rng.gen_range(RANDOM_SPEED.0..=RANDOM_SPEED.1) * stamina;
    step(world, agent, angle.cos() * speed, angle.sin() * speed, speed, metabolism)
}

/// One step toward `goal`, slowing on arrival. Returns the energy spent.
pub fn navigate_to(world: &mut World, agent: Entity, goal: (f32, f32), speed_factor: f32) -> f32 {
    use navigation_constants::*;
    let Some((stamina, metabolism)) = body(world, agent) else {
        return 0.0;
    };
    let Some(position) = world.get::<Transform>(agent).map(|t| t.position()) else {
        return 0.0;
    };
    let (dx, dy) = (goal.0 - position.0, goal.1 - position.1);
    let dist = distance(position, goal).max(1.0);
    let factor = if dist < ARRIVAL_SLOWDOWN {
        speed_factor * 0.5
    } else {
        speed_factor
    };
    let speed = dist.min(TARGET_SPEED * stamina * factor);
    step(world, agent, dx / dist * speed, dy / dist * speed, speed, metabolism)
}
