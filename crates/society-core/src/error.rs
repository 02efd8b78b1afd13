//! Error types for configuration, checkpoints and the simulation loop.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while saving or loading a checkpoint. A failed load never
/// leaves a partially built world behind.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checkpoint version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("checkpoint entity {owner} references missing entity {missing} ({field})")]
    DanglingReference {
        owner: u64,
        missing: u64,
        field: &'static str,
    },
    #[error("checkpoint entity id {0} appears more than once")]
    DuplicateId(u64),
    #[error("checkpoint is inconsistent: {0}")]
    Inconsistent(String),
}

/// Errors surfaced by the simulation loop.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("tick {tick} failed: {reason}")]
    Tick { tick: u64, reason: String },
    #[error("tick panicked: {0}")]
    Panicked(String),
    #[error("simulation failed {failures} ticks in a row; last error: {last}")]
    PersistentFailure { failures: u32, last: String },
    #[error("simulation thread is gone")]
    Disconnected,
    #[error("could not start simulation thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("event log IO error: {0}")]
    EventLog(#[from] std::io::Error),
}
