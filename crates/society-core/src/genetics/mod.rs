//! Genetics
//!
//! Heritable genomes, mate choice, reproduction and the generational
//! algorithm used when an epoch ends.

pub mod evolution;
pub mod genome;
pub mod mating;
pub mod reproduction;

pub use evolution::{fitness, next_generation, tournament_select, ArchivedAgent};
pub use genome::{Gender, Genome};
pub use mating::{attraction_score, is_compatible_mate, select_mate, Suitor};
pub use reproduction::attempt_reproduction;
