//! Lifecycle System
//!
//! Aging, death and epochs. An agent that dies is marked dead for the rest
//! of the tick so renderers can show it, then reaped at the start of the
//! next one: archived for breeding, released from workplaces and forgotten
//! by everyone who knew it. When nobody is left a new epoch is bred from
//! the archive.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind};

use crate::brain::Brain;
use crate::components::{
    Agent, BehaviorState, FarmPlot, FoodItem, Lineage, PopulationStats, Social, Vitals, Wallet, Workplace,
};
use crate::config::SimConfig;
use crate::events::logger::{entity_id, record_event};
use crate::genetics::{next_generation, ArchivedAgent, Genome};
use crate::setup::{spawn_infrastructure, spawn_population};
use crate::spatial::SpatialGrid;
use crate::store::ComponentStore;

/// Resource: archive of agents who died during the current epoch
#[derive(Resource, Debug, Clone, Default)]
pub struct Graveyard {
    pub archived: Vec<ArchivedAgent>,
}

impl Graveyard {
    pub fn len(&self) -> usize {
        self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archived.is_empty()
    }

    /// Hands over the archive for breeding and starts a fresh one.
    pub fn take(&mut self) -> Vec<ArchivedAgent> {
        std::mem::take(&mut self.archived)
    }
}

/// Ages every living agent by one tick and marks those whose energy ran
/// out or who passed the age limit. Returns the newly dead.
pub fn age_agents(world: &mut World) -> Vec<Entity> {
    let mut died = Vec::new();
    for agent in world.entities_with::<With<Agent>>() {
        let (metabolism, stamina) = world
            .get::<Genome>(agent)
            .map_or((1.0, 1.0), |g| (g.metabolism, g.stamina));
        let Some(mut vitals) = world.get_mut::<Vitals>(agent) else {
            continue;
        };
        if !vitals.alive {
            continue;
        }
        vitals.age_one_tick(metabolism, stamina);
        if !vitals.should_die() {
            continue;
        }
        vitals.alive = false;
        let cause = if vitals.energy <= 0.0 { "starvation" } else { "old age" };
        let age = vitals.age;

        if let Some(mut state) = world.get_mut::<BehaviorState>(agent) {
            *state = BehaviorState::Dead;
        }
        if let Some(mut stats) = world.get_resource_mut::<PopulationStats>() {
            stats.record_death();
        }
        record_event(world, |tick| {
            InteractionEvent::new(tick, InteractionEventKind::Death)
                .with_actor(entity_id(agent))
                .with_amount(age as f32)
                .with_detail(cause)
        });
        tracing::debug!(agent = ?agent, age, cause, "agent died");
        died.push(agent);
    }
    died
}

fn archive_entry(world: &World, agent: Entity, epoch: u32) -> Option<ArchivedAgent> {
    let genome = world.get::<Genome>(agent)?.clone();
    let vitals = world.get::<Vitals>(agent)?;
    let lineage = world.get::<Lineage>(agent).cloned().unwrap_or_default();
    Some(ArchivedAgent {
        genome,
        generation: lineage.generation,
        offspring_count: lineage.offspring_count,
        offspring_generations: lineage.offspring_generations,
        age: vitals.age,
        energy: vitals.energy.max(0.0),
        money: world.get::<Wallet>(agent).map_or(0.0, |w| w.money),
        mood: vitals.mood,
        corruption: vitals.corruption,
        epoch,
    })
}

/// Removes agents marked dead, archiving each one first. Returns how many
/// were removed.
pub fn reap_dead(world: &mut World) -> usize {
    let dead: Vec<Entity> = world
        .entities_with::<With<Agent>>()
        .into_iter()
        .filter(|a| world.get::<Vitals>(*a).is_some_and(|v| !v.alive))
        .collect();
    if dead.is_empty() {
        return 0;
    }

    let epoch = world
        .get_resource::<PopulationStats>()
        .map_or(0, |s| s.epoch);
    for &agent in &dead {
        if let Some(entry) = archive_entry(world, agent, epoch) {
            if let Some(mut graveyard) = world.get_resource_mut::<Graveyard>() {
                graveyard.archived.push(entry);
            }
        }
    }

    for workplace in world.entities_with::<With<Workplace>>() {
        if let Some(mut place) = world.get_mut::<Workplace>(workplace) {
            for &agent in &dead {
                place.release(agent);
            }
        }
    }
    for survivor in world.entities_with::<With<Social>>() {
        if dead.contains(&survivor) {
            continue;
        }
        if let Some(mut social) = world.get_mut::<Social>(survivor) {
            for &agent in &dead {
                social.forget(agent);
            }
        }
        if let Some(mut brain) = world.get_mut::<Brain>(survivor) {
            for &agent in &dead {
                brain.forget(agent);
            }
        }
    }

    for &agent in &dead {
        world.remove_entity(agent);
    }
    dead.len()
}

/// Living agents currently in the world
pub fn living_count(world: &mut World) -> usize {
    world
        .entities_with::<With<Agent>>()
        .into_iter()
        .filter(|a| world.get::<Vitals>(*a).is_some_and(|v| v.alive))
        .count()
}

/// Starts a new epoch once the population is extinct: the world is cleared
/// of farms, workplaces and food, rebuilt, and repopulated with genomes bred
/// from the archive. Returns true if a new epoch began.
pub fn restart_epoch_if_extinct<R: Rng>(world: &mut World, rng: &mut R) -> bool {
    if !world.entities_with::<With<Agent>>().is_empty() {
        return false;
    }
    let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
    let archive = world
        .get_resource_mut::<Graveyard>()
        .map(|mut g| g.take())
        .unwrap_or_default();
    let genomes = next_generation(&archive, config.population.size, &config.evolution, rng);

    for entity in world.entities_with::<Or<(With<FarmPlot>, With<Workplace>, With<FoodItem>)>>() {
        world.remove_entity(entity);
    }
    if let Some(mut grid) = world.get_resource_mut::<SpatialGrid>() {
        grid.clear();
    }
    spawn_infrastructure(world, &config, rng);
    let spawned = spawn_population(world, genomes, config.population.starting_money, rng);

    let epoch = match world.get_resource_mut::<PopulationStats>() {
        Some(mut stats) => {
            stats.start_epoch();
            stats.epoch
        }
        None => 0,
    };
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::EpochStarted)
            .with_amount(spawned.len() as f32)
            .with_detail(format!("epoch {epoch}"))
    });
    tracing::info!(epoch, population = spawned.len(), archived = archive.len(), "new epoch started");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::genetics::Gender;
    use crate::setup::spawn_workplace;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_starving_agent_is_marked_then_reaped() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (120.0, 100.0), Gender::Female);
        set_energy(&mut world, a, 0.1);
        world.get_mut::<Social>(b).unwrap().relationship_mut(a).trust = 0.5;
        let place = spawn_workplace(&mut world, (100.0, 110.0));
        world.get_mut::<Workplace>(place).unwrap().hire(a);

        assert_eq!(age_agents(&mut world), vec![a]);
        assert_eq!(*world.get::<BehaviorState>(a).unwrap(), BehaviorState::Dead);
        assert_eq!(world.resource::<PopulationStats>().deaths_this_epoch, 1);
        assert_eq!(living_count(&mut world), 1);

        assert_eq!(reap_dead(&mut world), 1);
        assert!(world.get_entity(a).is_none());
        assert!(!world.resource::<SpatialGrid>().contains(a));
        assert!(!world.get::<Workplace>(place).unwrap().employs(a));
        assert!(world.get::<Social>(b).unwrap().relationship(a).is_none());
        assert_eq!(world.resource::<Graveyard>().len(), 1);
        assert_eq!(reap_dead(&mut world), 0);
    }

    #[test]
    fn test_old_age_is_fatal() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        world.get_mut::<Vitals>(a).unwrap().age = 200;
        assert_eq!(age_agents(&mut world), vec![a]);
    }

    #[test]
    fn test_aging_drains_energy() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        assert!(age_agents(&mut world).is_empty());
        let vitals = world.get::<Vitals>(a).unwrap();
        assert_eq!(vitals.age, 1);
        assert!((vitals.energy - 99.7).abs() < 1e-4);
    }

    #[test]
    fn test_extinction_starts_new_epoch() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        {
            let mut config = world.resource_mut::<SimConfig>();
            config.population.size = 6;
            config.population.farm_count = 2;
            config.population.workplace_count = 1;
        }
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        spawn_workplace(&mut world, (300.0, 300.0));
        assert!(!restart_epoch_if_extinct(&mut world, &mut rng));

        set_energy(&mut world, a, 0.0);
        age_agents(&mut world);
        reap_dead(&mut world);
        assert!(restart_epoch_if_extinct(&mut world, &mut rng));

        assert_eq!(world.resource::<PopulationStats>().epoch, 1);
        assert!(world.resource::<Graveyard>().is_empty());
        assert_eq!(world.entities_with::<With<Agent>>().len(), 6);
        assert_eq!(world.entities_with::<With<FarmPlot>>().len(), 2);
        assert_eq!(world.entities_with::<With<Workplace>>().len(), 1);
        assert_eq!(world.resource::<SpatialGrid>().len(), 9);
    }
}
