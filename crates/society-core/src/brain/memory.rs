//! Agent Memory
//!
//! Three stores with different retention rules:
//! - replay buffer: FIFO ring of raw experiences for batch learning
//! - episodic memory: significant events, least important evicted first
//! - social memory: per-partner outcomes, best five kept

use bevy_ecs::prelude::*;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};
use society_events::{ActionKind, InteractionKind};
use std::collections::{BTreeMap, VecDeque};

use super::state::Features;

/// Memory limits
pub mod memory_constants {
    pub const REPLAY_CAPACITY: usize = 10_000;
    pub const EPISODIC_CAPACITY: usize = 100;
    pub const SOCIAL_PER_TARGET: usize = 5;
    /// Rewards larger than this in magnitude become episodic memories
    pub const SIGNIFICANT_REWARD: f32 = 1.0;
    pub const MAX_EXPERIENCE_IMPORTANCE: f32 = 0.9;
}

/// One step of experience
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: usize,
    pub features: Features,
    pub action: ActionKind,
    pub reward: f32,
    pub next_state: usize,
    pub next_features: Features,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(memory_constants::REPLAY_CAPACITY)
    }
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Up to `n` distinct experiences chosen uniformly.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<Experience> {
        let n = n.min(self.buffer.len());
        sample(rng, self.buffer.len(), n)
            .into_iter()
            .map(|i| self.buffer[i])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest(&self) -> Option<&Experience> {
        self.buffer.front()
    }
}

/// What an episodic memory is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    PositiveExperience,
    NegativeExperience,
    FoundFarm,
    FoundYieldFarm,
    FoundWorkplace,
    TradingPartner,
    PreferredMate,
    StoleCrops,
    WasStolenFrom,
    WasScammed,
    WasAttacked,
    CommittedMisconduct,
    Social(InteractionKind),
    Witnessed(InteractionKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryEntry {
    pub kind: MemoryKind,
    pub importance: f32,
    pub time: f32,
    pub position: Option<(f32, f32)>,
    pub subject: Option<Entity>,
}

impl MemoryEntry {
    pub fn new(kind: MemoryKind, importance: f32, time: f32) -> Self {
        Self {
            kind,
            importance,
            time,
            position: None,
            subject: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Some((x, y));
        self
    }

    pub fn about(mut self, subject: Entity) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Importance-ranked memory with a hard capacity
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodicMemory {
    entries: Vec<MemoryEntry>,
    capacity: usize,
}

impl Default for EpisodicMemory {
    fn default() -> Self {
        Self::new(memory_constants::EPISODIC_CAPACITY)
    }
}

impl EpisodicMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Adds an entry, first evicting the least important one when full.
    pub fn add(&mut self, entry: MemoryEntry) {
        if self.entries.len() >= self.capacity {
            if let Some((idx, _)) = self
                .entries
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.importance.total_cmp(&b.1.importance))
            {
                self.entries.remove(idx);
            }
        }
        self.entries.push(entry);
    }

    /// Entries of `kind` with at least `min_importance`, most important first.
    pub fn get(&self, kind: MemoryKind, min_importance: f32) -> Vec<&MemoryEntry> {
        let mut found: Vec<&MemoryEntry> = self
            .entries
            .iter()
            .filter(|e| e.kind == kind && e.importance >= min_importance)
            .collect();
        found.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        found
    }

    pub fn has(&self, kind: MemoryKind, min_importance: f32) -> bool {
        self.entries
            .iter()
            .any(|e| e.kind == kind && e.importance >= min_importance)
    }

    /// Entries about a particular agent
    pub fn about(&self, subject: Entity) -> Vec<&MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.subject == Some(subject))
            .collect()
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops references to an entity that no longer exists.
    pub fn forget_subject(&mut self, subject: Entity) {
        for entry in &mut self.entries {
            if entry.subject == Some(subject) {
                entry.subject = None;
            }
        }
    }
}

/// Outcome of one interaction with a particular partner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocialRecord {
    pub kind: InteractionKind,
    pub successful: bool,
    pub importance: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialMemory {
    records: BTreeMap<Entity, Vec<SocialRecord>>,
}

impl SocialMemory {
    pub fn record(&mut self, target: Entity, record: SocialRecord) {
        let list = self.records.entry(target).or_default();
        list.push(record);
        list.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        list.truncate(memory_constants::SOCIAL_PER_TARGET);
    }

    pub fn about(&self, target: Entity) -> &[SocialRecord] {
        self.records.get(&target).map_or(&[], |v| v.as_slice())
    }

    pub fn targets(&self) -> impl Iterator<Item = (&Entity, &Vec<SocialRecord>)> {
        self.records.iter()
    }

    pub fn forget(&mut self, target: Entity) {
        self.records.remove(&target);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
