//! State Encoding
//!
//! Continuous vitals are bucketed into three levels each. The five buckets
//! form a `StateKey` that indexes one of 243 Q-table rows; the same buckets
//! one-hot encoded plus four memory flags form the 19-wide network input.

use serde::{Deserialize, Serialize};

/// Bucket thresholds
pub mod bucket_constants {
    pub const ENERGY_LOW: f32 = 30.0;
    pub const ENERGY_MEDIUM: f32 = 70.0;
    pub const MONEY_LOW: f32 = 20.0;
    pub const MONEY_MEDIUM: f32 = 60.0;
    pub const MOOD_NEGATIVE: f32 = -0.3;
    pub const MOOD_NEUTRAL: f32 = 0.3;
    pub const CORRUPTION_LOW: f32 = 0.3;
    pub const CORRUPTION_MEDIUM: f32 = 0.7;
    /// Fractions of `max_food`
    pub const FOOD_LOW: f32 = 0.2;
    pub const FOOD_MEDIUM: f32 = 0.7;
}

/// Number of discrete states (3^5)
pub const STATE_COUNT: usize = 243;

/// Width of the network input vector
pub const FEATURE_COUNT: usize = 19;

pub type Features = [f32; FEATURE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    fn bucket(value: f32, low: f32, medium: f32) -> Self {
        if value < low {
            Level::Low
        } else if value < medium {
            Level::Medium
        } else {
            Level::High
        }
    }

    fn from_ordinal(i: usize) -> Self {
        match i {
            0 => Level::Low,
            1 => Level::Medium,
            _ => Level::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLevel {
    Negative,
    Neutral,
    Positive,
}

impl MoodLevel {
    pub fn label(self) -> &'static str {
        match self {
            MoodLevel::Negative => "negative",
            MoodLevel::Neutral => "neutral",
            MoodLevel::Positive => "positive",
        }
    }
}

/// Discretized agent state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub energy: Level,
    pub money: Level,
    pub mood: MoodLevel,
    pub corruption: Level,
    pub food: Level,
}

impl StateKey {
    /// Buckets raw vitals. `food_fraction` is `food / max_food`.
    pub fn from_vitals(energy: f32, money: f32, mood: f32, corruption: f32, food_fraction: f32) -> Self {
        use bucket_constants::*;
        let mood = if mood < MOOD_NEGATIVE {
            MoodLevel::Negative
        } else if mood < MOOD_NEUTRAL {
            MoodLevel::Neutral
        } else {
            MoodLevel::Positive
        };
        Self {
            energy: Level::bucket(energy, ENERGY_LOW, ENERGY_MEDIUM),
            money: Level::bucket(money, MONEY_LOW, MONEY_MEDIUM),
            mood,
            corruption: Level::bucket(corruption, CORRUPTION_LOW, CORRUPTION_MEDIUM),
            food: Level::bucket(food_fraction, FOOD_LOW, FOOD_MEDIUM),
        }
    }

    /// Row index in `[0, STATE_COUNT)`
    pub fn index(&self) -> usize {
        let mood = self.mood as usize;
        (((self.energy as usize * 3 + self.money as usize) * 3 + mood) * 3 + self.corruption as usize) * 3
            + self.food as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= STATE_COUNT {
            return None;
        }
        let digit = |place: usize| (index / place) % 3;
        let mood = match digit(9) {
            0 => MoodLevel::Negative,
            1 => MoodLevel::Neutral,
            _ => MoodLevel::Positive,
        };
        Some(Self {
            energy: Level::from_ordinal(digit(81)),
            money: Level::from_ordinal(digit(27)),
            mood,
            corruption: Level::from_ordinal(digit(3)),
            food: Level::from_ordinal(digit(1)),
        })
    }

    /// `"{energy}_{money}_{mood}_{corruption}_{food}"`
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.energy.label(),
            self.money.label(),
            self.mood.label(),
            self.corruption.label(),
            self.food.label()
        )
    }
}

/// What the agent remembers about its surroundings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFlags {
    pub knows_farm: bool,
    pub knows_yield_farm: bool,
    pub knows_workplace: bool,
    pub has_trading_partners: bool,
}

/// One-hot buckets followed by the memory flags.
pub fn encode_features(key: &StateKey, flags: MemoryFlags) -> Features {
    let mut features = [0.0; FEATURE_COUNT];
    let buckets = [
        key.energy as usize,
        key.money as usize,
        key.mood as usize,
        key.corruption as usize,
        key.food as usize,
    ];
    for (group, bucket) in buckets.iter().enumerate() {
        features[group * 3 + bucket] = 1.0;
    }
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    features[15] = flag(flags.knows_farm);
    features[16] = flag(flags.knows_yield_farm);
    features[17] = flag(flags.knows_workplace);
    features[18] = flag(flags.has_trading_partners);
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucketing_thresholds() {
        let key = StateKey::from_vitals(29.9, 20.0, -0.3, 0.7, 0.69);
        assert_eq!(key.energy, Level::Low);
        assert_eq!(key.money, Level::Medium);
        assert_eq!(key.mood, MoodLevel::Neutral);
        assert_eq!(key.corruption, Level::High);
        assert_eq!(key.food, Level::Medium);
        assert_eq!(key.label(), "low_medium_neutral_high_medium");
    }

    #[test]
    fn test_index_is_a_bijection() {
        let mut seen = vec![false; STATE_COUNT];
        for i in 0..STATE_COUNT {
            let key = StateKey::from_index(i).unwrap();
            assert_eq!(key.index(), i);
            assert!(!seen[i]);
            seen[i] = true;
        }
        assert!(StateKey::from_index(STATE_COUNT).is_none());
    }

    #[test]
    fn test_feature_encoding() {
        let key = StateKey::from_vitals(100.0, 0.0, 0.0, 0.5, 0.1);
        let features = encode_features(
            &key,
            MemoryFlags {
                knows_yield_farm: true,
                ..MemoryFlags::default()
            },
        );
        assert_eq!(features.iter().sum::<f32>(), 6.0);
        assert_eq!(features[2], 1.0); // energy high
        assert_eq!(features[3], 1.0); // money low
        assert_eq!(features[7], 1.0); // mood neutral
        assert_eq!(features[10], 1.0); // corruption medium
        assert_eq!(features[12], 1.0); // food low
        assert_eq!(features[16], 1.0);
    }
}
