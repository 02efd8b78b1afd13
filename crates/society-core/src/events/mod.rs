//! Interaction Events
//!
//! Systems push `InteractionEvent`s onto `PendingEvents` as things happen;
//! `flush_events` stamps them with ids and hands them to the `EventLogger`.

pub mod logger;

pub use logger::{flush_events, EventLogger, PendingEvents};
