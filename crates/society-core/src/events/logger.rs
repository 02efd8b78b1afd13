//! Event Logger
//!
//! Append-only JSONL interaction log.

use bevy_ecs::prelude::*;
use society_events::{generate_event_id, InteractionEvent, InteractionEventKind};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::components::SimClock;

/// Events kept in memory for inspection, newest last
const RECENT_CAPACITY: usize = 256;

/// Resource writing interaction events to a JSONL file
#[derive(Resource)]
pub struct EventLogger {
    writer: Option<BufWriter<File>>,
    event_count: u64,
    next_event_id: u64,
    /// Flush to disk every this many events
    flush_every: u64,
    recent: VecDeque<InteractionEvent>,
}

impl EventLogger {
    /// Creates a logger writing to `path`, truncating any previous log.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut logger = Self::null();
        logger.writer = Some(BufWriter::new(file));
        Ok(logger)
    }

    /// A logger that only keeps the recent window in memory
    pub fn null() -> Self {
        Self {
            writer: None,
            event_count: 0,
            next_event_id: 1,
            flush_every: 1,
            recent: VecDeque::new(),
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = generate_event_id(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn set_flush_every(&mut self, batch: u32) {
        self.flush_every = u64::from(batch.max(1));
    }

    pub fn recent(&self) -> impl Iterator<Item = &InteractionEvent> {
        self.recent.iter()
    }

    pub fn count_recent(&self, kind: InteractionEventKind) -> usize {
        self.recent.iter().filter(|e| e.kind == kind).count()
    }

    /// Stamps an id onto the event and appends it.
    pub fn log(&mut self, mut event: InteractionEvent) -> std::io::Result<()> {
        if event.event_id.is_empty() {
            event.event_id = self.next_id();
        }
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(&event)?;
            writeln!(writer, "{}", json)?;
            if self.event_count % self.flush_every == 0 {
                writer.flush()?;
            }
        }
        if self.recent.len() >= RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(event);
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush event log");
        }
    }
}

/// Events raised during the current tick
#[derive(Resource, Debug, Default)]
pub struct PendingEvents {
    events: Vec<InteractionEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InteractionEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<InteractionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Raw entity bits as used in event records
pub fn entity_id(entity: Entity) -> u64 {
    entity.to_bits()
}

/// Pushes an event stamped with the current tick. Missing resources are
/// treated as "not logging".
pub fn record_event(world: &mut World, build: impl FnOnce(u64) -> InteractionEvent) {
    let tick = world.get_resource::<SimClock>().map_or(0, |c| c.tick);
    if let Some(mut pending) = world.get_resource_mut::<PendingEvents>() {
        pending.push(build(tick));
    }
}

/// Moves this tick's events into the logger.
pub fn flush_events(world: &mut World) -> std::io::Result<()> {
    let events = match world.get_resource_mut::<PendingEvents>() {
        Some(mut pending) => pending.drain(),
        None => return Ok(()),
    };
    if events.is_empty() {
        return Ok(());
    }
    let Some(mut logger) = world.get_resource_mut::<EventLogger>() else {
        return Ok(());
    };
    for event in events {
        logger.log(event)?;
    }
    Ok(())
}
