//! World Setup
//!
//! Builds a fresh world from configuration: resources first, then farms,
//! workplaces and the initial population. The spawn helpers are shared with
//! reproduction, harvesting and epoch restarts.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::brain::Brain;
use crate::components::{
    Agent, BehaviorState, FarmPlot, FoodItem, Investor, LastAction, Lineage, PopulationStats,
    Reserves, SimClock, Social, Tag, Transform, Vitals, Wallet, Workplace, WorldBounds,
};
use crate::config::SimConfig;
use crate::events::{EventLogger, PendingEvents};
use crate::genetics::Genome;
use crate::output::metrics::ActionTally;
use crate::spatial::SpatialGrid;
use crate::systems::lifecycle::Graveyard;
use crate::systems::social::SocialEvents;
use crate::SimRng;

/// Everything needed to place a new agent
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub genome: Genome,
    pub position: (f32, f32),
    pub money: f32,
    pub generation: u32,
}

fn register(world: &mut World, entity: Entity, (x, y): (f32, f32)) {
    if let Some(mut grid) = world.get_resource_mut::<SpatialGrid>() {
        grid.insert(entity, x, y);
    }
}

fn clamp_to_world(world: &World, (x, y): (f32, f32)) -> (f32, f32) {
    match world.get_resource::<WorldBounds>() {
        Some(bounds) => bounds.clamp(x, y),
        None => (x, y),
    }
}

/// Random point inside the world
pub fn random_position<R: Rng>(world: &World, rng: &mut R) -> (f32, f32) {
    let bounds = world
        .get_resource::<WorldBounds>()
        .copied()
        .unwrap_or(WorldBounds::new(1.0, 1.0));
    (rng.gen_range(0.0..=bounds.width), rng.gen_range(0.0..=bounds.height))
}

/// Spawns an agent. Agents whose genome opts into neural learning also get
/// a `Brain`; the rest decide from the Q-table alone.
pub fn spawn_agent<R: Rng>(world: &mut World, spec: AgentSpec, rng: &mut R) -> Entity {
    let position = clamp_to_world(world, spec.position);
    let vitals = Vitals::with_corruption(spec.genome.corruption);
    let brain = if spec.genome.use_neural_network {
        let config = world
            .get_resource::<SimConfig>()
            .map(|c| c.brain.clone())
            .unwrap_or_default();
        Some(Brain::new(&config, rng))
    } else {
        None
    };

    let mut entity = world.spawn((
        Agent,
        Tag::Agent,
        Transform::at(position.0, position.1),
        vitals,
        Wallet::new(spec.money),
        Reserves::default(),
        Lineage {
            generation: spec.generation,
            ..Lineage::default()
        },
        LastAction::default(),
        BehaviorState::Idle,
        Social::new(),
        Investor::default(),
        spec.genome,
    ));
    if let Some(brain) = brain {
        entity.insert(brain);
    }
    let id = entity.id();
    register(world, id, position);
    id
}

pub fn spawn_farm(world: &mut World, position: (f32, f32)) -> Entity {
    let position = clamp_to_world(world, position);
    let id = world
        .spawn((Tag::Farm, Transform::at(position.0, position.1), FarmPlot::new()))
        .id();
    register(world, id, position);
    id
}

pub fn spawn_workplace(world: &mut World, position: (f32, f32)) -> Entity {
    let position = clamp_to_world(world, position);
    let id = world
        .spawn((
            Tag::Workplace,
            Transform::at(position.0, position.1),
            Workplace::default(),
        ))
        .id();
    register(world, id, position);
    id
}

pub fn spawn_food(world: &mut World, position: (f32, f32), nutrition: f32) -> Entity {
    let position = clamp_to_world(world, position);
    let id = world
        .spawn((
            Tag::Food,
            Transform::at(position.0, position.1),
            FoodItem { nutrition },
        ))
        .id();
    register(world, id, position);
    id
}

/// Farms and workplaces at random positions
pub fn spawn_infrastructure<R: Rng>(world: &mut World, config: &SimConfig, rng: &mut R) {
    for _ in 0..config.population.farm_count {
        let at = random_position(world, rng);
        spawn_farm(world, at);
    }
    for _ in 0..config.population.workplace_count {
        let at = random_position(world, rng);
        spawn_workplace(world, at);
    }
}

/// Spawns one agent per genome at random positions.
pub fn spawn_population<R: Rng>(
    world: &mut World,
    genomes: Vec<Genome>,
    starting_money: f32,
    rng: &mut R,
) -> Vec<Entity> {
    genomes
        .into_iter()
        .map(|genome| {
            let position = random_position(world, rng);
            let spec = AgentSpec {
                genome,
                position,
                money: starting_money,
                generation: 0,
            };
            spawn_agent(world, spec, rng)
        })
        .collect()
}

/// Inserts every resource the systems expect, with no entities.
pub fn insert_resources(world: &mut World, config: &SimConfig) {
    world.insert_resource(config.clone());
    world.insert_resource(WorldBounds::new(config.world.width, config.world.height));
    world.insert_resource(SpatialGrid::new(
        config.world.width,
        config.world.height,
        config.world.cell_size,
    ));
    world.insert_resource(SimClock::new());
    world.insert_resource(PopulationStats::default());
    world.insert_resource(SimRng(SmallRng::seed_from_u64(config.world.seed)));
    world.insert_resource(PendingEvents::new());
    world.insert_resource(EventLogger::null());
    world.insert_resource(SocialEvents::default());
    world.insert_resource(Graveyard::default());
    world.insert_resource(ActionTally::default());
}

/// A fully populated world ready to tick.
pub fn init_world(config: &SimConfig) -> World {
    let mut world = World::new();
    insert_resources(&mut world, config);
    crate::with_rng(&mut world, |world, rng| {
        spawn_infrastructure(world, config, rng);
        let genomes = (0..config.population.size)
            .map(|_| Genome::random(rng))
            .collect();
        spawn_population(world, genomes, config.population.starting_money, rng);
    });
    tracing::info!(
        agents = config.population.size,
        farms = config.population.farm_count,
        workplaces = config.population.workplace_count,
        seed = config.world.seed,
        "world initialized"
    );
    world
}
