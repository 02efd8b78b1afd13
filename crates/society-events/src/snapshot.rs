//! Render Snapshots
//!
//! Read-only view of every entity handed to a renderer. A renderer picks
//! assets from `asset_key`, `state` and `alive` and never writes back.

use serde::{Deserialize, Serialize};

/// Role of a rendered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Farm,
    Workplace,
    Food,
}

/// One entity as seen by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    /// Raw entity bits, stable for the lifetime of the entity
    pub id: u64,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    /// Behavior or display state, e.g. "eating", "yield", "understaffed"
    pub state: String,
    /// Asset selector, e.g. "person_female", "farm_sewed"
    pub asset_key: String,
    pub alive: bool,
}

/// Full render snapshot of the world at one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub width: f32,
    pub height: f32,
    pub entities: Vec<EntityView>,
}

impl RenderSnapshot {
    pub fn count_kind(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind == kind).count()
    }

    pub fn find(&self, id: u64) -> Option<&EntityView> {
        self.entities.iter().find(|e| e.id == id)
    }
}
