//! Shared data types for the agent society simulation.
//!
//! This crate holds the vocabularies and read-only records that leave the
//! simulation core: action and interaction kinds, render snapshots, metric
//! samples and the interaction event log. It contains no simulation logic.

pub mod action;
pub mod interaction;
pub mod metrics;
pub mod snapshot;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use action::{ActionKind, InteractionKind, ACTION_COUNT, PRIMARY_ACTION_COUNT};
pub use interaction::{generate_event_id, generate_run_id, InteractionEvent, InteractionEventKind};
pub use metrics::{
    ActionCounts, EconomyMetrics, MetricsSample, PerformanceMetrics, PopulationMetrics, Summary,
};
pub use snapshot::{EntityKind, EntityView, RenderSnapshot};
