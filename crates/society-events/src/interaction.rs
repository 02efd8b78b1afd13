//! Interaction Events
//!
//! Append-only records of notable things that happened in the society:
//! births, deaths, trades, gifts, crimes and epoch changes. Entity references
//! are raw entity bits so the records stay meaningful outside the process.

use serde::{Deserialize, Serialize};

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// Generates a unique id for a simulation run or checkpoint.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEventKind {
    Birth,
    Death,
    Gift,
    Trade,
    Investment,
    Harvest,
    CropTheft,
    Theft,
    Scam,
    Violence,
    Misconduct,
    Revenge,
    EpochStarted,
}

/// A single logged interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub event_id: String,
    pub tick: u64,
    pub kind: InteractionEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    /// Money, food or damage moved by the interaction, if any
    #[serde(default)]
    pub amount: f32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl InteractionEvent {
    pub fn new(tick: u64, kind: InteractionEventKind) -> Self {
        Self {
            event_id: String::new(),
            tick,
            kind,
            actor: None,
            target: None,
            amount: 0.0,
            detail: String::new(),
        }
    }

    pub fn with_actor(mut self, actor: u64) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_amount(mut self, amount: f32) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
