//! Metric Samples
//!
//! Aggregate statistics pulled from the simulation every few ticks for the
//! monitoring layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::ActionKind;

/// Mean/median/min/max of one quantity across the living population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f32,
    pub median: f32,
    pub min: f32,
    pub max: f32,
}

impl Summary {
    /// Summarizes a set of values. An empty set yields all zeros.
    pub fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let sum: f32 = sorted.iter().sum();
        Self {
            mean: sum / sorted.len() as f32,
            median: sorted[sorted.len() / 2],
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Population counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationMetrics {
    pub alive: usize,
    /// Deaths since the start of the run
    pub dead: u64,
    pub males: usize,
    pub females: usize,
    /// Births during the current epoch
    pub births: u64,
    /// Deaths during the current epoch
    pub deaths: u64,
    pub epoch: u32,
    /// Agents with energy below the starvation line
    pub starving: usize,
    pub max_generation: u32,
}

/// Economic and vital aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomyMetrics {
    pub wealth: Summary,
    pub food: Summary,
    pub energy: Summary,
    pub age: Summary,
    pub avg_mood: f32,
    pub avg_corruption: f32,
    pub farm_count: usize,
    pub farms_yielding: usize,
    pub food_items: usize,
    pub workplace_count: usize,
    pub employed: usize,
    pub employment_rate: f32,
    pub job_vacancies: usize,
    pub avg_productivity: f32,
    pub total_capital: f32,
}

/// Per-action invocation counts, keyed by action name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCounts(pub BTreeMap<String, u64>);

impl ActionCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: ActionKind) {
        *self.0.entry(action.name().to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, action: ActionKind) -> u64 {
        self.0.get(action.name()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Scheduler and throughput counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub speed_mode: String,
    pub steps_per_frame: u32,
    pub avg_frame_ms: f32,
    pub iterations_per_second: f32,
    pub ticks_run: u64,
}

/// One sampled row of metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub tick: u64,
    pub population: PopulationMetrics,
    pub economy: EconomyMetrics,
    /// Actions taken since the previous sample
    pub actions: ActionCounts,
    pub performance: PerformanceMetrics,
}
