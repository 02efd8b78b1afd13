//! Output Module
//!
//! Read-only views leaving the simulation: render snapshots and sampled
//! metrics.

pub mod metrics;
pub mod render;

pub use metrics::{collect_metrics, ActionTally, MetricsCollector};
pub use render::{build_render_snapshot, build_render_snapshot_with};
