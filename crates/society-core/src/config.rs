//! Configuration System
//!
//! All tunables live in one TOML-backed tree. Every section defaults, so an
//! empty file (or no file) yields the reference settings. Individual values
//! can be overridden with dotted `section.field=value` pairs.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::scheduler::SpeedMode;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "society.toml";

/// Complete simulation configuration. Also stored in the world as a
/// resource so systems can read their tunables.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub world: WorldConfig,
    pub population: PopulationConfig,
    pub evolution: EvolutionConfig,
    pub brain: BrainConfig,
    pub scheduler: SchedulerConfig,
    pub metrics: MetricsConfig,
}

/// World geometry and seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub cell_size: f32,
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            cell_size: 100.0,
            seed: 42,
        }
    }
}

/// Initial entity counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub size: usize,
    pub farm_count: usize,
    pub workplace_count: usize,
    pub starting_money: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 100,
            farm_count: 25,
            workplace_count: 15,
            starting_money: 50.0,
        }
    }
}

/// Genetic algorithm settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub mutation_rate: f32,
    pub elite_percentage: f32,
    pub tournament_size: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            elite_percentage: 0.5,
            tournament_size: 4,
        }
    }
}

/// Decision engine settings, including the exploration-rate schedule
/// `base_exploration / (1 + age / exploration_decay_age)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    pub base_exploration: f32,
    pub exploration_decay_age: f32,
    /// Chance per agent step of running a replay learning pass
    pub learn_probability: f32,
    pub batch_size: usize,
    pub replay_capacity: usize,
    pub episodic_capacity: usize,
    pub target_update_frequency: u64,
    pub gamma: f32,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            base_exploration: 0.1,
            exploration_decay_age: 100.0,
            learn_probability: 0.1,
            batch_size: 32,
            replay_capacity: 10_000,
            episodic_capacity: 100,
            target_update_frequency: 100,
            gamma: 0.99,
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub speed_mode: SpeedMode,
    pub auto_optimize: bool,
    pub target_fps: f32,
    /// Ticks between economic updates at normal speed
    pub economy_interval: u64,
    /// Ticks between agricultural updates at normal speed
    pub agriculture_interval: u64,
    /// Ticks between relationship decay passes at normal speed
    pub social_interval: u64,
    /// Consecutive failed ticks before the loop gives up
    pub max_consecutive_failures: u32,
    pub error_cooldown_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            speed_mode: SpeedMode::Normal,
            auto_optimize: false,
            target_fps: 30.0,
            economy_interval: 2,
            agriculture_interval: 4,
            social_interval: 1,
            max_consecutive_failures: 10,
            error_cooldown_ms: 100,
        }
    }
}

/// Metrics sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub sampling_interval: u64,
    pub max_history: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 10,
            max_history: 1000,
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads from `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Overrides a single `section.field` value, parsing `raw` as the
    /// field's existing type.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let mut tree = toml::Value::try_from(&*self)?;
        let slot = tree
            .get_mut(section)
            .and_then(|s| s.get_mut(field))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let raw = raw.trim();
        *slot = match slot {
            toml::Value::Integer(_) => toml::Value::Integer(raw.parse().map_err(|_| invalid())?),
            toml::Value::Float(_) => toml::Value::Float(raw.parse().map_err(|_| invalid())?),
            toml::Value::Boolean(_) => toml::Value::Boolean(raw.parse().map_err(|_| invalid())?),
            toml::Value::String(_) => toml::Value::String(raw.to_string()),
            _ => return Err(invalid()),
        };

        let updated: SimConfig = tree.try_into().map_err(|_| invalid())?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Applies a list of `key=value` overrides in order.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> Result<(), ConfigError> {
        for item in overrides {
            let item = item.as_ref();
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: item.to_string(),
                    value: String::new(),
                })?;
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width <= 0.0 || self.world.height <= 0.0 {
            return Err(ConfigError::Invalid("world dimensions must be positive".into()));
        }
        if self.world.cell_size <= 0.0 {
            return Err(ConfigError::Invalid("cell_size must be positive".into()));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.evolution.mutation_rate)
            || !unit.contains(&self.evolution.elite_percentage)
            || !unit.contains(&self.brain.learn_probability)
        {
            return Err(ConfigError::Invalid("rates must lie in [0, 1]".into()));
        }
        if self.scheduler.economy_interval == 0
            || self.scheduler.agriculture_interval == 0
            || self.scheduler.social_interval == 0
            || self.metrics.sampling_interval == 0
        {
            return Err(ConfigError::Invalid("intervals must be at least 1".into()));
        }
        Ok(())
    }
}
