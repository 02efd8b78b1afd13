//! Generational Evolution
//!
//! When a population dies out, the archive of its members is scored and a
//! new generation of genomes is bred from it: tournament-selected parents
//! for the elite share, fresh random genomes for the rest, then mutation
//! applied to a random subset.

use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EvolutionConfig;

use super::genome::Genome;

pub mod evolution_constants {
    pub const GENERATIONS_WEIGHT: f32 = 0.2;
    pub const OFFSPRING_WEIGHT: f32 = 0.2;
    pub const AGE_WEIGHT: f32 = 0.2;
    pub const ENERGY_WEIGHT: f32 = 0.1;
    pub const MONEY_WEIGHT: f32 = 0.2;
    pub const MOOD_WEIGHT: f32 = 0.1;
    pub const CORRUPTION_PENALTY: f32 = 0.5;
    /// Rate used when mutating the selected subset
    pub const SUBSET_MUTATION_RATE: f32 = 0.2;
    pub const JUMP_CHANCE: f64 = 0.1;
    /// Genomes produced when there is nothing to breed from
    pub const EMPTY_ARCHIVE_SIZE: usize = 10;
}

/// A dead agent as remembered for breeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedAgent {
    pub genome: Genome,
    pub generation: u32,
    pub offspring_count: u32,
    pub offspring_generations: u32,
    pub age: u32,
    pub energy: f32,
    pub money: f32,
    pub mood: f32,
    pub corruption: f32,
    pub epoch: u32,
}

/// Fitness of every archived agent, in archive order. Counts, age and money
/// are normalized by the archive maximum.
pub fn fitness(archive: &[ArchivedAgent]) -> Vec<f32> {
    use evolution_constants::*;
    let max_of = |f: fn(&ArchivedAgent) -> f32| archive.iter().map(f).fold(0.0_f32, f32::max);
    let max_generations = max_of(|a| a.offspring_generations as f32);
    let max_offspring = max_of(|a| a.offspring_count as f32);
    let max_age = max_of(|a| a.age as f32);
    let max_money = max_of(|a| a.money);
    let ratio = |v: f32, max: f32| if max > 0.0 { v / max } else { 0.0 };

    archive
        .iter()
        .map(|a| {
            ratio(a.offspring_generations as f32, max_generations) * GENERATIONS_WEIGHT
                + ratio(a.offspring_count as f32, max_offspring) * OFFSPRING_WEIGHT
                + ratio(a.age as f32, max_age) * AGE_WEIGHT
                + (a.energy / 100.0) * ENERGY_WEIGHT
                + ratio(a.money, max_money) * MONEY_WEIGHT
                + ((a.mood + 1.0) / 2.0) * MOOD_WEIGHT
                - a.corruption * CORRUPTION_PENALTY
        })
        .collect()
}

/// Index of the fittest among `min(size, n)` distinct random entrants.
pub fn tournament_select<R: Rng>(scores: &[f32], size: usize, rng: &mut R) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let entrants = size.clamp(1, scores.len());
    sample(rng, scores.len(), entrants)
        .into_iter()
        .max_by(|a, b| scores[*a].total_cmp(&scores[*b]).then(b.cmp(a)))
}

/// Breeds `target_size` genomes from the archive.
pub fn next_generation<R: Rng>(
    archive: &[ArchivedAgent],
    target_size: usize,
    config: &EvolutionConfig,
    rng: &mut R,
) -> Vec<Genome> {
    use evolution_constants::*;
    if archive.is_empty() {
        return (0..EMPTY_ARCHIVE_SIZE).map(|_| Genome::random(rng)).collect();
    }

    let scores = fitness(archive);
    let elite_count = ((target_size as f32) * config.elite_percentage) as usize;
    let mut genomes = Vec::with_capacity(target_size);

    for _ in 0..elite_count.min(target_size) {
        let first = tournament_select(&scores, config.tournament_size, rng);
        let second = tournament_select(&scores, config.tournament_size, rng);
        if let (Some(a), Some(b)) = (first, second) {
            genomes.push(Genome::crossover(&archive[a].genome, &archive[b].genome, rng));
        }
    }
    while genomes.len() < target_size {
        genomes.push(Genome::random(rng));
    }

    let mutation_count = ((genomes.len() as f32) * config.mutation_rate) as usize;
    for idx in sample(rng, genomes.len(), mutation_count.min(genomes.len())) {
        let genome = &mut genomes[idx];
        genome.mutate(SUBSET_MUTATION_RATE, rng);
        if rng.gen_bool(JUMP_CHANCE) {
            genome.jump(rng);
        }
    }
    genomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn archived(rng: &mut SmallRng, offspring: u32, money: f32, corruption: f32) -> ArchivedAgent {
        ArchivedAgent {
            genome: Genome::random(rng),
            generation: 0,
            offspring_count: offspring,
            offspring_generations: offspring,
            age: 100,
            energy: 50.0,
            money,
            mood: 0.0,
            corruption,
            epoch: 0,
        }
    }

    #[test]
    fn test_fitness_rewards_success_and_penalizes_corruption() {
        let mut rng = SmallRng::seed_from_u64(1);
        let archive = vec![
            archived(&mut rng, 4, 100.0, 0.0),
            archived(&mut rng, 0, 0.0, 0.0),
            archived(&mut rng, 4, 100.0, 0.8),
        ];
        let scores = fitness(&archive);
        // 0.2 + 0.2 + 0.2 + 0.05 + 0.2 + 0.05
        assert!((scores[0] - 0.9).abs() < 1e-5);
        assert!(scores[0] > scores[1]);
        assert!((scores[0] - scores[2] - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_fitness_handles_all_zero_archive() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut agent = archived(&mut rng, 0, 0.0, 0.0);
        agent.age = 0;
        agent.energy = 0.0;
        let scores = fitness(&[agent]);
        assert!((scores[0] - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_tournament_with_full_field_picks_best() {
        let mut rng = SmallRng::seed_from_u64(3);
        let scores = [0.1, 0.9, 0.4];
        for _ in 0..20 {
            assert_eq!(tournament_select(&scores, 4, &mut rng), Some(1));
        }
        assert_eq!(tournament_select(&[], 4, &mut rng), None);
    }

    #[test]
    fn test_empty_archive_yields_ten_random_genomes() {
        let mut rng = SmallRng::seed_from_u64(4);
        let genomes = next_generation(&[], 50, &EvolutionConfig::default(), &mut rng);
        assert_eq!(genomes.len(), 10);
    }

    #[test]
    fn test_next_generation_fills_target_size() {
        let mut rng = SmallRng::seed_from_u64(5);
        let archive: Vec<_> = (0..6).map(|i| archived(&mut rng, i, i as f32, 0.1)).collect();
        let genomes = next_generation(&archive, 20, &EvolutionConfig::default(), &mut rng);
        assert_eq!(genomes.len(), 20);
        assert!(genomes.iter().all(|g| g.is_valid()));
    }
}
