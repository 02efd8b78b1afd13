//! Metrics Output
//!
//! Pull-based aggregate metrics. `collect_metrics` reads the world once and
//! builds a `MetricsSample`; `MetricsCollector` calls it every
//! `sampling_interval` ticks and keeps a bounded history for charts and
//! export.

use bevy_ecs::prelude::*;
use society_events::{
    ActionCounts, ActionKind, EconomyMetrics, MetricsSample, PerformanceMetrics, PopulationMetrics, Summary,
};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::brain::state::bucket_constants::ENERGY_LOW;
use crate::components::{
    Agent, FarmPlot, FoodItem, Lineage, PopulationStats, Reserves, SimClock, Vitals, Wallet, Workplace,
};
use crate::config::MetricsConfig;
use crate::genetics::{Gender, Genome};
use crate::store::ComponentStore;

/// Metric names understood by `MetricsCollector::series`
pub const SERIES_NAMES: &[&str] = &[
    "population",
    "births",
    "deaths",
    "starving",
    "wealth_mean",
    "food_mean",
    "energy_mean",
    "age_mean",
    "mood",
    "corruption",
    "employment_rate",
    "farms_yielding",
    "total_capital",
    "actions",
    "iterations_per_second",
];

/// Resource: actions taken since the last sample
#[derive(Resource, Debug, Clone, Default)]
pub struct ActionTally {
    pub counts: ActionCounts,
}

impl ActionTally {
    pub fn record(&mut self, action: ActionKind) {
        self.counts.record(action);
    }

    /// Hands over the counts and starts a new window.
    pub fn take(&mut self) -> ActionCounts {
        std::mem::take(&mut self.counts)
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn population_metrics(world: &mut World, agents: &[Entity]) -> PopulationMetrics {
    let stats = world.get_resource::<PopulationStats>().cloned().unwrap_or_default();
    let mut metrics = PopulationMetrics {
        dead: stats.total_deaths,
        births: stats.births_this_epoch,
        deaths: stats.deaths_this_epoch,
        epoch: stats.epoch,
        ..Default::default()
    };
    for &agent in agents {
        let Some(vitals) = world.get::<Vitals>(agent) else {
            continue;
        };
        if !vitals.alive {
            continue;
        }
        metrics.alive += 1;
        if vitals.energy < ENERGY_LOW {
            metrics.starving += 1;
        }
        match world.get::<Genome>(agent).map(|g| g.gender) {
            Some(Gender::Male) => metrics.males += 1,
            Some(Gender::Female) => metrics.females += 1,
            None => {}
        }
        let generation = world.get::<Lineage>(agent).map_or(0, |l| l.generation);
        metrics.max_generation = metrics.max_generation.max(generation);
    }
    metrics
}

fn economy_metrics(world: &mut World, agents: &[Entity]) -> EconomyMetrics {
    let mut wealth = Vec::new();
    let mut food = Vec::new();
    let mut energy = Vec::new();
    let mut age = Vec::new();
    let mut mood = Vec::new();
    let mut corruption = Vec::new();
    for &agent in agents {
        let Some(vitals) = world.get::<Vitals>(agent) else {
            continue;
        };
        if !vitals.alive {
            continue;
        }
        energy.push(vitals.energy);
        age.push(vitals.age as f32);
        mood.push(vitals.mood);
        corruption.push(vitals.corruption);
        wealth.push(world.get::<Wallet>(agent).map_or(0.0, |w| w.money));
        food.push(world.get::<Reserves>(agent).map_or(0.0, |r| r.food));
    }

    let farms = world.entities_with::<With<FarmPlot>>();
    let farms_yielding = farms
        .iter()
        .filter(|f| world.get::<FarmPlot>(**f).is_some_and(|p| p.has_yield()))
        .count();
    let food_items = world.entities_with::<With<FoodItem>>().len();

    let workplaces = world.entities_with::<With<Workplace>>();
    let (mut employed, mut vacancies, mut capital) = (0, 0, 0.0);
    let mut productivity = Vec::new();
    for &workplace in &workplaces {
        if let Some(place) = world.get::<Workplace>(workplace) {
            employed += place.workers.len();
            vacancies += place.max_workers.saturating_sub(place.workers.len());
            capital += place.capital;
            productivity.push(place.productivity);
        }
    }

    let alive = energy.len();
    EconomyMetrics {
        wealth: Summary::from_values(&wealth),
        food: Summary::from_values(&food),
        energy: Summary::from_values(&energy),
        age: Summary::from_values(&age),
        avg_mood: mean(&mood),
        avg_corruption: mean(&corruption),
        farm_count: farms.len(),
        farms_yielding,
        food_items,
        workplace_count: workplaces.len(),
        employed,
        employment_rate: if alive == 0 { 0.0 } else { employed as f32 / alive as f32 },
        job_vacancies: vacancies,
        avg_productivity: mean(&productivity),
        total_capital: capital,
    }
}

/// Builds one metrics sample from the current world. Drains the action
/// tally, so each sample counts the actions since the previous one.
pub fn collect_metrics(world: &mut World, performance: PerformanceMetrics) -> MetricsSample {
    let agents = world.entities_with::<With<Agent>>();
    let tick = world.get_resource::<SimClock>().map_or(0, |c| c.tick);
    let population = population_metrics(world, &agents);
    let economy = economy_metrics(world, &agents);
    let actions = world
        .get_resource_mut::<ActionTally>()
        .map(|mut t| t.take())
        .unwrap_or_default();
    MetricsSample {
        tick,
        population,
        economy,
        actions,
        performance,
    }
}

/// Sampled metrics history
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    sampling_interval: u64,
    max_history: usize,
    history: VecDeque<MetricsSample>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

impl MetricsCollector {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            sampling_interval: config.sampling_interval.max(1),
            max_history: config.max_history.max(1),
            history: VecDeque::new(),
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.sampling_interval == 0
    }

    /// Samples the world if `tick` falls on the sampling interval.
    pub fn maybe_sample(&mut self, world: &mut World, tick: u64, performance: PerformanceMetrics) -> Option<&MetricsSample> {
        if !self.is_due(tick) {
            return None;
        }
        let sample = collect_metrics(world, performance);
        self.push(sample);
        self.history.back()
    }

    pub fn push(&mut self, sample: MetricsSample) {
        self.history.push_back(sample);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &MetricsSample> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// The last `limit` values of a named metric as `(tick, value)` pairs,
    /// oldest first. Unknown names give `None`.
    pub fn series(&self, name: &str, limit: usize) -> Option<Vec<(u64, f32)>> {
        let pick: fn(&MetricsSample) -> f32 = match name {
            "population" => |s| s.population.alive as f32,
            "births" => |s| s.population.births as f32,
            "deaths" => |s| s.population.deaths as f32,
            "starving" => |s| s.population.starving as f32,
            "wealth_mean" => |s| s.economy.wealth.mean,
            "food_mean" => |s| s.economy.food.mean,
            "energy_mean" => |s| s.economy.energy.mean,
            "age_mean" => |s| s.economy.age.mean,
            "mood" => |s| s.economy.avg_mood,
            "corruption" => |s| s.economy.avg_corruption,
            "employment_rate" => |s| s.economy.employment_rate,
            "farms_yielding" => |s| s.economy.farms_yielding as f32,
            "total_capital" => |s| s.economy.total_capital,
            "actions" => |s| s.actions.total() as f32,
            "iterations_per_second" => |s| s.performance.iterations_per_second,
            _ => return None,
        };
        let skip = self.history.len().saturating_sub(limit);
        Some(self.history.iter().skip(skip).map(|s| (s.tick, pick(s))).collect())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let samples: Vec<&MetricsSample> = self.history.iter().collect();
        serde_json::to_string_pretty(&samples)
    }

    /// Writes the whole history as a JSON array.
    pub fn export_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = self.to_json().map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::setup::{spawn_farm, spawn_workplace};

    #[test]
    fn test_collect_counts_population_and_economy() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (200.0, 100.0), Gender::Female);
        let c = agent(&mut world, (300.0, 100.0), Gender::Female);
        set_money(&mut world, a, 10.0);
        set_money(&mut world, b, 30.0);
        set_energy(&mut world, b, 10.0);
        world.get_mut::<Vitals>(c).unwrap().alive = false;
        spawn_farm(&mut world, (400.0, 400.0));
        let place = spawn_workplace(&mut world, (500.0, 500.0));
        world.get_mut::<Workplace>(place).unwrap().hire(a);
        world.resource_mut::<ActionTally>().record(ActionKind::Eat);

        let sample = collect_metrics(&mut world, PerformanceMetrics::default());
        assert_eq!(sample.population.alive, 2);
        assert_eq!(sample.population.males, 1);
        assert_eq!(sample.population.females, 1);
        assert_eq!(sample.population.starving, 1);
        assert_eq!(sample.economy.wealth.mean, 20.0);
        assert_eq!(sample.economy.wealth.min, 10.0);
        assert_eq!(sample.economy.farm_count, 1);
        assert_eq!(sample.economy.employed, 1);
        assert_eq!(sample.economy.job_vacancies, 4);
        assert_eq!(sample.economy.employment_rate, 0.5);
        assert_eq!(sample.actions.get(ActionKind::Eat), 1);
        // the tally restarts after each sample
        let again = collect_metrics(&mut world, PerformanceMetrics::default());
        assert_eq!(again.actions.total(), 0);
    }

    #[test]
    fn test_empty_world_gives_zeroed_metrics() {
        let mut world = world();
        let sample = collect_metrics(&mut world, PerformanceMetrics::default());
        assert_eq!(sample.population.alive, 0);
        assert_eq!(sample.economy.employment_rate, 0.0);
        assert_eq!(sample.economy.avg_mood, 0.0);
    }

    #[test]
    fn test_collector_samples_on_interval_and_bounds_history() {
        let mut world = world();
        agent(&mut world, (100.0, 100.0), Gender::Male);
        let mut collector = MetricsCollector::new(&MetricsConfig {
            sampling_interval: 10,
            max_history: 3,
        });
        for tick in 0..=50 {
            world.resource_mut::<SimClock>().tick = tick;
            collector.maybe_sample(&mut world, tick, PerformanceMetrics::default());
        }
        assert_eq!(collector.len(), 3);
        assert_eq!(collector.latest().unwrap().tick, 50);

        let series = collector.series("population", 2).unwrap();
        assert_eq!(series, vec![(40, 1.0), (50, 1.0)]);
        assert!(collector.series("happiness", 2).is_none());
        for name in SERIES_NAMES {
            assert!(collector.series(name, 1).is_some());
        }
    }

    #[test]
    fn test_json_export() {
        let mut collector = MetricsCollector::default();
        collector.push(MetricsSample {
            tick: 7,
            ..Default::default()
        });
        let parsed: Vec<MetricsSample> = serde_json::from_str(&collector.to_json().unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tick, 7);
    }
}
