//! Agent Components
//!
//! Per-agent vitals, lineage and the record of the last action taken.
//! Genome and brain live in their own modules.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use society_events::ActionKind;

use super::world::resource_constants::MAX_ENERGY;

/// Constants for agent vitals
pub mod vital_constants {
    /// Energy lost per tick before the metabolism/stamina ratio
    pub const BASE_DECAY: f32 = 0.3;
    /// Agents older than this die
    pub const MAX_AGE: u32 = 200;
    /// Divisor converting a reward into a mood shift
    pub const MOOD_REWARD_DIVISOR: f32 = 5.0;
    /// Per-tick relaxation of positive mood
    pub const POSITIVE_MOOD_RETENTION: f32 = 0.99;
    /// Per-tick relaxation of negative mood
    pub const NEGATIVE_MOOD_RETENTION: f32 = 0.98;
    /// Corruption gained per unethical act
    pub const CORRUPTION_GAIN: f32 = 0.05;
    /// Corruption shed per honest tick
    pub const CORRUPTION_RECOVERY: f32 = 0.002;
    /// Energy below which an agent counts as starving
    pub const STARVING_ENERGY: f32 = 20.0;
}

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Continuous agent state
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub age: u32,
    pub energy: f32,
    /// -1.0 (miserable) to 1.0 (content)
    pub mood: f32,
    /// 0.0 (honest) to 1.0 (thoroughly corrupt)
    pub corruption: f32,
    pub alive: bool,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            age: 0,
            energy: MAX_ENERGY,
            mood: 0.0,
            corruption: 0.0,
            alive: true,
        }
    }
}

impl Vitals {
    pub fn with_corruption(corruption: f32) -> Self {
        Self {
            corruption: corruption.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Shifts mood by the reward, then relaxes it toward neutral.
    pub fn apply_reward(&mut self, reward: f32) {
        use vital_constants::*;
        self.mood = (self.mood + reward / MOOD_REWARD_DIVISOR).clamp(-1.0, 1.0);
        if self.mood > 0.0 {
            self.mood *= POSITIVE_MOOD_RETENTION;
        } else {
            self.mood *= NEGATIVE_MOOD_RETENTION;
        }
    }

    pub fn shift_mood(&mut self, delta: f32) {
        self.mood = (self.mood + delta).clamp(-1.0, 1.0);
    }

    pub fn update_corruption(&mut self, unethical: bool) {
        use vital_constants::*;
        let delta = if unethical {
            CORRUPTION_GAIN
        } else {
            -CORRUPTION_RECOVERY
        };
        self.corruption = (self.corruption + delta).clamp(0.0, 1.0);
    }

    pub fn spend_energy(&mut self, amount: f32) {
        self.energy -= amount;
    }

    pub fn gain_energy(&mut self, amount: f32) {
        self.energy = (self.energy + amount).min(MAX_ENERGY);
    }

    /// One tick of aging and metabolic drain.
    pub fn age_one_tick(&mut self, metabolism: f32, stamina: f32) {
        self.age += 1;
        self.energy -= vital_constants::BASE_DECAY * metabolism / stamina.max(0.01);
    }

    pub fn should_die(&self) -> bool {
        self.energy <= 0.0 || self.age > vital_constants::MAX_AGE
    }
}

/// Family history used for fitness scoring
#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub generation: u32,
    pub offspring_count: u32,
    /// Deepest generation among this agent's descendants
    pub offspring_generations: u32,
}

/// The agent's most recent decision and its outcome
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct LastAction {
    pub current: Option<ActionKind>,
    pub previous: Option<ActionKind>,
    pub reward: f32,
}

impl LastAction {
    pub fn record(&mut self, action: ActionKind, reward: f32) {
        self.previous = self.current.replace(action);
        self.reward = reward;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_tracks_reward_and_relaxes() {
        let mut vitals = Vitals::default();
        vitals.apply_reward(5.0);
        assert!((vitals.mood - 0.99).abs() < 1e-6);

        vitals.apply_reward(-20.0);
        assert!((vitals.mood - -0.98).abs() < 1e-6);
        assert!(vitals.mood >= -1.0);
    }

    #[test]
    fn test_corruption_bounds() {
        let mut vitals = Vitals::default();
        vitals.update_corruption(false);
        assert_eq!(vitals.corruption, 0.0);
        for _ in 0..40 {
            vitals.update_corruption(true);
        }
        assert_eq!(vitals.corruption, 1.0);
        vitals.update_corruption(false);
        assert!((vitals.corruption - 0.998).abs() < 1e-6);
    }

    #[test]
    fn test_aging_and_death() {
        let mut vitals = Vitals::default();
        vitals.age_one_tick(1.0, 1.0);
        assert_eq!(vitals.age, 1);
        assert!((vitals.energy - 99.7).abs() < 1e-4);
        assert!(!vitals.should_die());

        vitals.age = vital_constants::MAX_AGE + 1;
        assert!(vitals.should_die());

        let mut starving = Vitals::default();
        starving.energy = 0.0;
        assert!(starving.should_die());
    }

    #[test]
    fn test_last_action_history() {
        let mut last = LastAction::default();
        last.record(ActionKind::Eat, 1.0);
        last.record(ActionKind::Work, 0.5);
        assert_eq!(last.current, Some(ActionKind::Work));
        assert_eq!(last.previous, Some(ActionKind::Eat));
        assert_eq!(last.reward, 0.5);
    }
}
