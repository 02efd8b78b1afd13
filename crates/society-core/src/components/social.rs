//! Social Components
//!
//! Directed relationships (trust and affinity toward another agent) plus the
//! personality traits that scale how strongly an agent reacts to others.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use society_events::InteractionKind;
use std::collections::{BTreeMap, VecDeque};

/// Constants for relationships
pub mod social_constants {
    /// Largest change a single update may apply to trust or affinity
    pub const MAX_CHANGE: f32 = 0.2;
    /// Interactions remembered per relationship
    pub const HISTORY_LEN: usize = 10;
    /// Trust at or below which a target counts as distrusted
    pub const DISTRUST_THRESHOLD: f32 = -0.3;
    /// Trust at or above which a target counts as trusted
    pub const TRUST_THRESHOLD: f32 = 0.3;
    /// Affinity at or above which a target counts as liked
    pub const LIKE_THRESHOLD: f32 = 0.3;
    pub const DEFAULT_TRAIT: f32 = 0.5;
}

/// One remembered interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: InteractionKind,
    /// Heard about through gossip rather than experienced
    pub witnessed: bool,
    pub successful: bool,
    pub time: f32,
}

/// How one agent regards another. Both values stay in [-1, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub trust: f32,
    pub affinity: f32,
    pub interaction_count: u32,
    pub successful_interactions: u32,
    pub last_kind: Option<InteractionKind>,
    pub last_interaction_time: f32,
    pub history: VecDeque<HistoryEntry>,
}

impl Relationship {
    pub fn update_trust(&mut self, change: f32) {
        let change = change.clamp(-social_constants::MAX_CHANGE, social_constants::MAX_CHANGE);
        self.trust = (self.trust + change).clamp(-1.0, 1.0);
    }

    pub fn update_affinity(&mut self, change: f32) {
        let change = change.clamp(-social_constants::MAX_CHANGE, social_constants::MAX_CHANGE);
        self.affinity = (self.affinity + change).clamp(-1.0, 1.0);
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.interaction_count += 1;
        if entry.successful {
            self.successful_interactions += 1;
        }
        self.last_kind = Some(entry.kind);
        self.last_interaction_time = entry.time;
        self.history.push_back(entry);
        while self.history.len() > social_constants::HISTORY_LEN {
            self.history.pop_front();
        }
    }

    pub fn success_rate(&self) -> f32 {
        if self.interaction_count == 0 {
            0.0
        } else {
            self.successful_interactions as f32 / self.interaction_count as f32
        }
    }

    /// Mean of trust and affinity
    pub fn score(&self) -> f32 {
        (self.trust + self.affinity) / 2.0
    }

    /// Most recent wrong suffered directly (not via gossip)
    pub fn last_wrong(&self) -> Option<InteractionKind> {
        self.history
            .iter()
            .rev()
            .find(|e| !e.successful && !e.witnessed && e.kind.is_antisocial())
            .map(|e| e.kind)
    }
}

/// Relationships and personality of an agent
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Social {
    pub relationships: BTreeMap<Entity, Relationship>,
    /// -1.0 (outcast) to 1.0 (respected)
    pub status: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub reciprocity: f32,
}

impl Default for Social {
    fn default() -> Self {
        Self {
            relationships: BTreeMap::new(),
            status: 0.0,
            extraversion: social_constants::DEFAULT_TRAIT,
            agreeableness: social_constants::DEFAULT_TRAIT,
            reciprocity: social_constants::DEFAULT_TRAIT,
        }
    }
}

impl Social {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or lazily creates the relationship toward `target`.
    pub fn relationship_mut(&mut self, target: Entity) -> &mut Relationship {
        self.relationships.entry(target).or_default()
    }

    pub fn relationship(&self, target: Entity) -> Option<&Relationship> {
        self.relationships.get(&target)
    }

    pub fn record_interaction(
        &mut self,
        target: Entity,
        entry: HistoryEntry,
        trust_change: f32,
        affinity_change: f32,
    ) {
        let rel = self.relationship_mut(target);
        rel.record(entry);
        if trust_change != 0.0 {
            rel.update_trust(trust_change);
        }
        if affinity_change != 0.0 {
            rel.update_affinity(affinity_change);
        }
    }

    pub fn update_status(&mut self, change: f32) {
        self.status = (self.status + change).clamp(-1.0, 1.0);
    }

    /// Status drift from the overall quality and breadth of relationships.
    pub fn status_change(&self) -> Option<f32> {
        if self.relationships.is_empty() {
            return None;
        }
        let n = self.relationships.len() as f32;
        let avg = self.relationships.values().map(|r| r.score()).sum::<f32>() / n;
        let breadth = (n / 10.0).min(1.0);
        Some((avg * 0.1 + breadth * 0.1) / 2.0)
    }

    pub fn trusted_agents(&self) -> Vec<Entity> {
        self.filter(|r| r.trust >= social_constants::TRUST_THRESHOLD)
    }

    pub fn distrusted_agents(&self) -> Vec<Entity> {
        self.filter(|r| r.trust <= social_constants::DISTRUST_THRESHOLD)
    }

    pub fn liked_agents(&self) -> Vec<Entity> {
        self.filter(|r| r.affinity >= social_constants::LIKE_THRESHOLD)
    }

    pub fn relationship_score(&self, target: Entity) -> f32 {
        self.relationship(target).map(|r| r.score()).unwrap_or(0.0)
    }

    /// Agents whose relationship score reaches `min_score`, best first.
    pub fn potential_partners(&self, min_score: f32) -> Vec<(Entity, f32)> {
        let mut partners: Vec<(Entity, f32)> = self
            .relationships
            .iter()
            .map(|(e, r)| (*e, r.score()))
            .filter(|(_, s)| *s >= min_score)
            .collect();
        partners.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        partners
    }

    /// Drops every relationship toward `target`.
    pub fn forget(&mut self, target: Entity) {
        self.relationships.remove(&target);
    }

    fn filter(&self, pred: impl Fn(&Relationship) -> bool) -> Vec<Entity> {
        self.relationships
            .iter()
            .filter(|(_, r)| pred(r))
            .map(|(e, _)| *e)
            .collect()
    }
}
