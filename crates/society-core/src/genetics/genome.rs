//! Genome
//!
//! Heritable traits plus the inherited Q-table. Traits are drawn uniformly
//! at birth, recombined one trait at a time from either parent and nudged by
//! bounded mutation.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::brain::QTable;

/// Trait ranges and mutation magnitudes
pub mod genome_constants {
    pub const METABOLISM_RANGE: (f32, f32) = (0.5, 1.5);
    pub const STAMINA_RANGE: (f32, f32) = (0.5, 1.5);
    pub const LEARNING_RANGE: (f32, f32) = (0.1, 0.9);
    pub const ATTRACTION_RANGE: (f32, f32) = (-1.0, 1.0);
    pub const PREFERENCE_RANGE: (f32, f32) = (0.0, 1.0);
    pub const CORRUPTION_RANGE: (f32, f32) = (0.0, 0.3);
    pub const NEURAL_CHANCE: f64 = 0.5;

    /// Hard bounds after mutation
    pub const BODY_BOUNDS: (f32, f32) = (0.1, 2.0);
    pub const LEARNING_BOUNDS: (f32, f32) = (0.05, 1.0);

    pub const BODY_STEP: f32 = 0.2;
    pub const LEARNING_STEP: f32 = 0.1;
    pub const ATTRACTION_STEP: f32 = 0.3;
    pub const PREFERENCE_STEP: f32 = 0.2;
    pub const CORRUPTION_STEP: f32 = 0.1;
    pub const Q_VALUE_STEP: f32 = 0.5;

    /// Resampling ranges for a jump mutation
    pub const JUMP_BODY_RANGE: (f32, f32) = (0.3, 2.0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub gender: Gender,
    pub metabolism: f32,
    pub stamina: f32,
    pub learning_capacity: f32,
    /// Positive favors partners with "better" traits, negative favors similarity
    pub attraction_profile: f32,
    /// Degree of opposite-sex preference; below 0.5 favors the same sex
    pub sexual_preference: f32,
    /// Corruption the agent is born with
    pub corruption: f32,
    pub use_neural_network: bool,
    pub q_table: QTable,
}

fn uniform<R: Rng>(rng: &mut R, (lo, hi): (f32, f32)) -> f32 {
    rng.gen_range(lo..=hi)
}

fn pick<T: Copy, R: Rng>(rng: &mut R, a: T, b: T) -> T {
    if rng.gen_bool(0.5) {
        a
    } else {
        b
    }
}

fn nudge<R: Rng>(rng: &mut R, value: f32, step: f32, (lo, hi): (f32, f32)) -> f32 {
    (value + rng.gen_range(-step..=step)).clamp(lo, hi)
}

impl Genome {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let gender = Gender::random(rng);
        Self::random_with_gender(gender, rng)
    }

    pub fn random_with_gender<R: Rng>(gender: Gender, rng: &mut R) -> Self {
        use genome_constants::*;
        Self {
            gender,
            metabolism: uniform(rng, METABOLISM_RANGE),
            stamina: uniform(rng, STAMINA_RANGE),
            learning_capacity: uniform(rng, LEARNING_RANGE),
            attraction_profile: uniform(rng, ATTRACTION_RANGE),
            sexual_preference: uniform(rng, PREFERENCE_RANGE),
            corruption: uniform(rng, CORRUPTION_RANGE),
            use_neural_network: rng.gen_bool(NEURAL_CHANCE),
            q_table: QTable::new(),
        }
    }

    /// Each trait comes from one parent at random; Q-tables merge per state.
    pub fn crossover<R: Rng>(a: &Genome, b: &Genome, rng: &mut R) -> Self {
        Self {
            gender: pick(rng, a.gender, b.gender),
            metabolism: pick(rng, a.metabolism, b.metabolism),
            stamina: pick(rng, a.stamina, b.stamina),
            learning_capacity: pick(rng, a.learning_capacity, b.learning_capacity),
            attraction_profile: pick(rng, a.attraction_profile, b.attraction_profile),
            sexual_preference: pick(rng, a.sexual_preference, b.sexual_preference),
            corruption: pick(rng, a.corruption, b.corruption),
            use_neural_network: pick(rng, a.use_neural_network, b.use_neural_network),
            q_table: QTable::crossover(&a.q_table, &b.q_table, rng),
        }
    }

    /// Mutates each trait independently with probability `rate`.
    pub fn mutate<R: Rng>(&mut self, rate: f32, rng: &mut R) {
        use genome_constants::*;
        let rate = rate.clamp(0.0, 1.0) as f64;

        if rng.gen_bool(rate) {
            self.metabolism = nudge(rng, self.metabolism, BODY_STEP, BODY_BOUNDS);
        }
        if rng.gen_bool(rate) {
            self.stamina = nudge(rng, self.stamina, BODY_STEP, BODY_BOUNDS);
        }
        if rng.gen_bool(rate) {
            self.learning_capacity =
                nudge(rng, self.learning_capacity, LEARNING_STEP, LEARNING_BOUNDS);
        }
        if rng.gen_bool(rate) {
            self.attraction_profile =
                nudge(rng, self.attraction_profile, ATTRACTION_STEP, ATTRACTION_RANGE);
        }
        if rng.gen_bool(rate) {
            self.sexual_preference =
                nudge(rng, self.sexual_preference, PREFERENCE_STEP, PREFERENCE_RANGE);
        }
        if rng.gen_bool(rate) {
            self.corruption = nudge(rng, self.corruption, CORRUPTION_STEP, (0.0, 1.0));
        }
        if rng.gen_bool(rate) {
            self.q_table.perturb_random(Q_VALUE_STEP, rng);
        }
        if rng.gen_bool(rate) {
            self.use_neural_network = !self.use_neural_network;
        }
    }

    /// Resamples one random trait across its full range.
    pub fn jump<R: Rng>(&mut self, rng: &mut R) {
        use genome_constants::*;
        match rng.gen_range(0..5) {
            0 => self.metabolism = uniform(rng, JUMP_BODY_RANGE),
            1 => self.stamina = uniform(rng, JUMP_BODY_RANGE),
            2 => self.learning_capacity = uniform(rng, LEARNING_BOUNDS),
            3 => self.attraction_profile = uniform(rng, ATTRACTION_RANGE),
            _ => self.sexual_preference = uniform(rng, PREFERENCE_RANGE),
        }
    }

    /// True when every scalar trait lies inside its mutation bounds.
    pub fn is_valid(&self) -> bool {
        use genome_constants::*;
        let within = |v: f32, (lo, hi): (f32, f32)| v.is_finite() && v >= lo && v <= hi;
        within(self.metabolism, BODY_BOUNDS)
            && within(self.stamina, BODY_BOUNDS)
            && within(self.learning_capacity, LEARNING_BOUNDS)
            && within(self.attraction_profile, ATTRACTION_RANGE)
            && within(self.sexual_preference, PREFERENCE_RANGE)
            && within(self.corruption, (0.0, 1.0))
            && self.q_table.is_well_formed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use society_events::ActionKind;

    #[test]
    fn test_random_genomes_are_in_range() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            let g = Genome::random(&mut rng);
            assert!(g.is_valid());
            assert!(g.metabolism >= 0.5 && g.metabolism <= 1.5);
            assert!(g.learning_capacity >= 0.1 && g.learning_capacity <= 0.9);
            assert!(g.corruption <= 0.3);
        }
    }

    #[test]
    fn test_crossover_draws_each_trait_from_a_parent() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut a = Genome::random_with_gender(Gender::Male, &mut rng);
        let b = Genome::random_with_gender(Gender::Female, &mut rng);
        a.q_table.set(10, ActionKind::Work, 2.0);

        for _ in 0..20 {
            let child = Genome::crossover(&a, &b, &mut rng);
            assert!(child.metabolism == a.metabolism || child.metabolism == b.metabolism);
            assert!(child.stamina == a.stamina || child.stamina == b.stamina);
            assert!(
                child.sexual_preference == a.sexual_preference
                    || child.sexual_preference == b.sexual_preference
            );
            assert_eq!(child.q_table.get(10, ActionKind::Work), 2.0);
        }
    }

    #[test]
    fn test_mutation_respects_bounds() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut g = Genome::random(&mut rng);
        g.metabolism = 1.95;
        g.attraction_profile = -0.95;
        for _ in 0..500 {
            g.mutate(1.0, &mut rng);
            if rng.gen_bool(0.1) {
                g.jump(&mut rng);
            }
            assert!(g.is_valid(), "{g:?}");
        }
    }

    #[test]
    fn test_zero_rate_leaves_genome_unchanged() {
        let mut rng = SmallRng::seed_from_u64(4);
        let g = Genome::random(&mut rng);
        let mut copy = g.clone();
        copy.mutate(0.0, &mut rng);
        assert_eq!(copy, g);
    }
}
