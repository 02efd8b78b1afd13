//! Speed Modes
//!
//! A speed mode trades fidelity for throughput: more ticks per frame, fewer
//! rendered frames, stretched system intervals and a larger agent batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much of the world a renderer receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderDetail {
    /// Every entity
    Full,
    /// Agents, farms and workplaces; loose food items are left out
    Reduced,
    /// Agents only
    Minimal,
    /// No snapshots at all
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    #[default]
    Normal,
    Fast,
    Faster,
    Fastest,
}

/// Scheduling parameters of one speed mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedProfile {
    pub steps_per_frame: u32,
    pub render_every: u32,
    /// Multiplier on system update frequency; intervals become
    /// `ceil(base / factor)`
    pub frequency_factor: f32,
    pub batch_size: usize,
    pub render_detail: RenderDetail,
}

impl SpeedMode {
    pub const ALL: [SpeedMode; 4] = [SpeedMode::Normal, SpeedMode::Fast, SpeedMode::Faster, SpeedMode::Fastest];

    pub fn profile(self) -> SpeedProfile {
        let (steps_per_frame, render_every, frequency_factor, batch_size, render_detail) = match self {
            SpeedMode::Normal => (1, 1, 1.0, 1, RenderDetail::Full),
            SpeedMode::Fast => (3, 2, 0.7, 5, RenderDetail::Reduced),
            SpeedMode::Faster => (5, 5, 0.5, 10, RenderDetail::Minimal),
            SpeedMode::Fastest => (10, 100, 0.2, 50, RenderDetail::Headless),
        };
        SpeedProfile {
            steps_per_frame,
            render_every,
            frequency_factor,
            batch_size,
            render_detail,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedMode::Normal => "normal",
            SpeedMode::Fast => "fast",
            SpeedMode::Faster => "faster",
            SpeedMode::Fastest => "fastest",
        }
    }

    /// Next faster mode, saturating at `Fastest`
    pub fn faster(self) -> Self {
        match self {
            SpeedMode::Normal => SpeedMode::Fast,
            SpeedMode::Fast => SpeedMode::Faster,
            SpeedMode::Faster | SpeedMode::Fastest => SpeedMode::Fastest,
        }
    }

    /// Next slower mode, saturating at `Normal`
    pub fn slower(self) -> Self {
        match self {
            SpeedMode::Fastest => SpeedMode::Faster,
            SpeedMode::Faster => SpeedMode::Fast,
            SpeedMode::Fast | SpeedMode::Normal => SpeedMode::Normal,
        }
    }
}

impl fmt::Display for SpeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SpeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpeedMode::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown speed mode `{s}` (expected normal, fast, faster or fastest)"))
    }
}

impl SpeedProfile {
    /// Effective interval of a system whose base interval is `base` ticks
    pub fn interval(&self, base: u64) -> u64 {
        ((base as f32 / self.frequency_factor).ceil() as u64).max(1)
    }
}
