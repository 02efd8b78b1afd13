//! Reproduction
//!
//! Opposite-sex pairs with enough energy may conceive. Success is a roll
//! weighted by the parents' energy and penalized by the older parent's age.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind};

use crate::components::{Lineage, PopulationStats, Transform, Vitals, Wallet};
use crate::config::SimConfig;
use crate::events::logger::{entity_id, record_event};
use crate::setup::{spawn_agent, AgentSpec};

use super::genome::Genome;

pub mod reproduction_constants {
    pub const MIN_ENERGY: f32 = 40.0;
    pub const BASE_CHANCE: f32 = 0.3;
    /// Age at which conception becomes impossible
    pub const AGE_LIMIT: f32 = 100.0;
    pub const ENERGY_COST: f32 = 30.0;
    /// Share of the parents' combined money handed to the child
    pub const INHERITANCE_SHARE: f32 = 0.1;
}

/// Conception probability for two parents
pub fn conception_chance(energy_a: f32, energy_b: f32, oldest_age: u32) -> f32 {
    use reproduction_constants::*;
    let energy_factor = (energy_a + energy_b) / 200.0;
    let age_factor = 1.0 - oldest_age as f32 / AGE_LIMIT;
    (BASE_CHANCE * energy_factor * age_factor).max(0.0)
}

/// Tries to produce a child of `a` and `b`, returning it on success.
pub fn attempt_reproduction<R: Rng>(
    world: &mut World,
    a: Entity,
    b: Entity,
    rng: &mut R,
) -> Option<Entity> {
    use reproduction_constants::*;
    if a == b {
        return None;
    }
    let genome_a = world.get::<Genome>(a)?;
    let genome_b = world.get::<Genome>(b)?;
    if genome_a.gender == genome_b.gender {
        return None;
    }
    let vitals_a = world.get::<Vitals>(a)?;
    let vitals_b = world.get::<Vitals>(b)?;
    if vitals_a.energy < MIN_ENERGY || vitals_b.energy < MIN_ENERGY {
        return None;
    }

    let chance = conception_chance(
        vitals_a.energy,
        vitals_b.energy,
        vitals_a.age.max(vitals_b.age),
    );
    if rng.gen::<f32>() >= chance {
        return None;
    }

    let mutation_rate = world
        .get_resource::<SimConfig>()
        .map_or(0.1, |c| c.evolution.mutation_rate);
    let mut genome = Genome::crossover(genome_a, genome_b, rng);
    genome.mutate(mutation_rate, rng);

    let pos_a = world.get::<Transform>(a).map(|t| t.position()).unwrap_or_default();
    let pos_b = world.get::<Transform>(b).map(|t| t.position()).unwrap_or_default();
    let position = ((pos_a.0 + pos_b.0) / 2.0, (pos_a.1 + pos_b.1) / 2.0);

    let money_a = world.get::<Wallet>(a).map_or(0.0, |w| w.money);
    let money_b = world.get::<Wallet>(b).map_or(0.0, |w| w.money);
    let half_share = (money_a + money_b).max(0.0) * INHERITANCE_SHARE / 2.0;
    let mut inheritance = 0.0;
    for parent in [a, b] {
        if let Some(mut wallet) = world.get_mut::<Wallet>(parent) {
            inheritance += wallet.withdraw(half_share);
        }
        if let Some(mut vitals) = world.get_mut::<Vitals>(parent) {
            vitals.spend_energy(ENERGY_COST);
        }
    }

    let generation_a = world.get::<Lineage>(a).map_or(0, |l| l.generation);
    let generation_b = world.get::<Lineage>(b).map_or(0, |l| l.generation);
    let generation = generation_a.max(generation_b) + 1;
    for parent in [a, b] {
        if let Some(mut lineage) = world.get_mut::<Lineage>(parent) {
            lineage.offspring_count += 1;
            lineage.offspring_generations = lineage.offspring_generations.max(generation);
        }
    }

    let child = spawn_agent(
        world,
        AgentSpec {
            genome,
            position,
            money: inheritance,
            generation,
        },
        rng,
    );

    if let Some(mut stats) = world.get_resource_mut::<PopulationStats>() {
        stats.record_birth();
    }
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Birth)
            .with_actor(entity_id(child))
            .with_target(entity_id(a))
            .with_amount(inheritance)
            .with_detail(format!("generation {generation}"))
    });
    tracing::debug!(child = ?child, generation, "agent born");
    Some(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::Gender;
    use crate::setup::insert_resources;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn parent(world: &mut World, gender: Gender, energy: f32, rng: &mut SmallRng) -> Entity {
        let mut genome = Genome::random_with_gender(gender, rng);
        genome.use_neural_network = false;
        let agent = spawn_agent(
            world,
            AgentSpec {
                genome,
                position: (100.0, 100.0),
                money: 100.0,
                generation: 2,
            },
            rng,
        );
        world.get_mut::<Vitals>(agent).unwrap().energy = energy;
        agent
    }

    fn world() -> World {
        let mut world = World::new();
        insert_resources(&mut world, &SimConfig::default());
        world
    }

    #[test]
    fn test_same_gender_never_reproduces() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        let a = parent(&mut world, Gender::Female, 100.0, &mut rng);
        let b = parent(&mut world, Gender::Female, 100.0, &mut rng);
        for _ in 0..200 {
            assert!(attempt_reproduction(&mut world, a, b, &mut rng).is_none());
        }
    }

    #[test]
    fn test_low_energy_never_reproduces() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = world();
        let a = parent(&mut world, Gender::Male, 39.0, &mut rng);
        let b = parent(&mut world, Gender::Female, 39.0, &mut rng);
        for _ in 0..200 {
            assert!(attempt_reproduction(&mut world, a, b, &mut rng).is_none());
        }
    }

    #[test]
    fn test_successful_birth_charges_parents() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut world = world();
        let a = parent(&mut world, Gender::Male, 100.0, &mut rng);
        let b = parent(&mut world, Gender::Female, 100.0, &mut rng);

        let child = (0..500)
            .find_map(|_| {
                world.get_mut::<Vitals>(a).unwrap().energy = 100.0;
                world.get_mut::<Vitals>(b).unwrap().energy = 100.0;
                attempt_reproduction(&mut world, a, b, &mut rng)
            })
            .expect("a healthy pair conceives eventually");

        assert_eq!(world.get::<Lineage>(child).unwrap().generation, 3);
        assert!((world.get::<Wallet>(child).unwrap().money - 20.0).abs() < 1e-4);
        assert!((world.get::<Wallet>(a).unwrap().money - 90.0).abs() < 1e-4);
        assert_eq!(world.get::<Vitals>(a).unwrap().energy, 70.0);
        assert_eq!(world.get::<Lineage>(b).unwrap().offspring_count, 1);
        assert_eq!(world.resource::<PopulationStats>().total_births, 1);
    }

    #[test]
    fn test_conception_chance() {
        assert!((conception_chance(100.0, 100.0, 0) - 0.3).abs() < 1e-6);
        assert_eq!(conception_chance(100.0, 100.0, 150), 0.0);
    }
}
