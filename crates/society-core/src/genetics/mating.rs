//! Mate Compatibility
//!
//! Pure functions over two genomes. Compatibility is checked from both
//! sides: each agent's preference must match the pairing (or pass a small
//! exploration roll) and each must find the other attractive enough.

use bevy_ecs::prelude::*;
use rand::Rng;

use super::genome::Genome;

pub mod mating_constants {
    pub const MIN_ENERGY: f32 = 30.0;
    pub const EXPLORATION_CHANCE: f64 = 0.1;
    pub const PREFERENCE_SPLIT: f32 = 0.5;
    pub const BASE_THRESHOLD: f32 = 0.5;
    /// Threshold multiplier when either partner's preference is weak
    pub const WEAK_PREFERENCE_MULTIPLIER: f32 = 1.5;
    /// Same-sex pairs need both preferences at or below this
    pub const STRONG_SAME_PREFERENCE: f32 = 0.3;
    /// Opposite-sex pairs need both preferences at or above this
    pub const STRONG_OPPOSITE_PREFERENCE: f32 = 0.7;
    pub const BASE_ATTRACTION: f32 = 1.0;
    pub const OPTIMAL_METABOLISM: f32 = 1.0;
}

/// One side of a prospective pairing
#[derive(Debug, Clone, Copy)]
pub struct Suitor<'a> {
    pub genome: &'a Genome,
    pub energy: f32,
}

impl<'a> Suitor<'a> {
    pub fn new(genome: &'a Genome, energy: f32) -> Self {
        Self { genome, energy }
    }
}

/// How attractive `candidate` is to `chooser`.
pub fn attraction_score(chooser: &Genome, candidate: &Genome) -> f32 {
    use mating_constants::*;
    let profile = chooser.attraction_profile;
    let stamina_diff = candidate.stamina - chooser.stamina;
    let metabolism_diff = candidate.metabolism - chooser.metabolism;
    let learning_diff = candidate.learning_capacity - chooser.learning_capacity;

    let mut score = BASE_ATTRACTION;
    if profile > 0.0 {
        let metabolism_fit = 1.0 - (candidate.metabolism - OPTIMAL_METABOLISM).abs();
        score += stamina_diff * profile;
        score += metabolism_fit * profile;
        score += learning_diff * profile;
    } else {
        let weight = profile.abs();
        score -= stamina_diff.abs() * weight;
        score -= metabolism_diff.abs() * weight;
        score -= learning_diff.abs() * weight;
    }
    score
}

/// Attraction both sides must reach for this pairing.
pub fn attraction_threshold(a: &Genome, b: &Genome) -> f32 {
    use mating_constants::*;
    let weak = if a.gender == b.gender {
        a.sexual_preference > STRONG_SAME_PREFERENCE || b.sexual_preference > STRONG_SAME_PREFERENCE
    } else {
        a.sexual_preference < STRONG_OPPOSITE_PREFERENCE
            || b.sexual_preference < STRONG_OPPOSITE_PREFERENCE
    };
    if weak {
        BASE_THRESHOLD * WEAK_PREFERENCE_MULTIPLIER
    } else {
        BASE_THRESHOLD
    }
}

fn preferences_align(a: &Genome, b: &Genome) -> bool {
    use mating_constants::PREFERENCE_SPLIT;
    if a.gender == b.gender {
        a.sexual_preference < PREFERENCE_SPLIT && b.sexual_preference < PREFERENCE_SPLIT
    } else {
        a.sexual_preference >= PREFERENCE_SPLIT && b.sexual_preference >= PREFERENCE_SPLIT
    }
}

/// Whether `a` and `b` would mate. Misaligned preferences still pass on a
/// 10% exploration roll.
pub fn is_compatible_mate<R: Rng>(a: Suitor<'_>, b: Suitor<'_>, rng: &mut R) -> bool {
    use mating_constants::*;
    if a.energy < MIN_ENERGY || b.energy < MIN_ENERGY {
        return false;
    }
    if !preferences_align(a.genome, b.genome) && !rng.gen_bool(EXPLORATION_CHANCE) {
        return false;
    }
    let threshold = attraction_threshold(a.genome, b.genome);
    attraction_score(a.genome, b.genome) >= threshold
        && attraction_score(b.genome, a.genome) >= threshold
}

/// Most attractive candidate; the earliest entity wins ties.
pub fn select_mate(chooser: &Genome, candidates: &[(Entity, &Genome)]) -> Option<Entity> {
    let mut best: Option<(Entity, f32)> = None;
    for (entity, genome) in candidates {
        let score = attraction_score(chooser, genome);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((*entity, score)),
        }
    }
    best.map(|(entity, _)| entity)
}
