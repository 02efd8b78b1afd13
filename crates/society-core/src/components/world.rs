//! World Components
//!
//! Geometry, clocks, and the small value components every entity kind
//! shares: position, role tag, wallet, food reserves and behavior state.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Constants for resources held by agents
pub mod resource_constants {
    /// Food an agent can hold in reserve
    pub const MAX_FOOD: f32 = 100.0;
    /// Energy ceiling for every agent
    pub const MAX_ENERGY: f32 = 100.0;
}

/// World rectangle; positions are clamped into `[0, width] x [0, height]`.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}

/// Simulation clock. `time` advances one unit per tick and is the time base
/// for relationship decay.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    pub tick: u64,
    pub time: f32,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.time += 1.0;
    }
}

/// Birth/death bookkeeping across epochs
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub epoch: u32,
    pub births_this_epoch: u64,
    pub deaths_this_epoch: u64,
    pub total_deaths: u64,
    pub total_births: u64,
}

impl PopulationStats {
    pub fn record_birth(&mut self) {
        self.births_this_epoch += 1;
        self.total_births += 1;
    }

    pub fn record_death(&mut self) {
        self.deaths_this_epoch += 1;
        self.total_deaths += 1;
    }

    pub fn start_epoch(&mut self) {
        self.epoch += 1;
        self.births_this_epoch = 0;
        self.deaths_this_epoch = 0;
    }
}

/// Position and last movement vector
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Transform {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, vx: 0.0, vy: 0.0 }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Role of an entity, used to filter proximity queries
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Agent,
    Farm,
    Workplace,
    Food,
}

/// Money held by an agent. Debits clamp at the available balance.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub money: f32,
}

impl Wallet {
    pub fn new(money: f32) -> Self {
        Self { money }
    }

    pub fn can_afford(&self, amount: f32) -> bool {
        self.money >= amount
    }

    pub fn deposit(&mut self, amount: f32) {
        self.money += amount.max(0.0);
    }

    /// Removes up to `amount`, returning what was actually withdrawn.
    pub fn withdraw(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.money.max(0.0));
        self.money -= taken;
        taken
    }
}

/// Stored food, always within `[0, max_food]`
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reserves {
    pub food: f32,
    pub max_food: f32,
}

impl Default for Reserves {
    fn default() -> Self {
        Self {
            food: 0.0,
            max_food: resource_constants::MAX_FOOD,
        }
    }
}

impl Reserves {
    pub fn with_food(food: f32) -> Self {
        let mut reserves = Self::default();
        reserves.add_food(food);
        reserves
    }

    /// Stores as much of `amount` as fits, returning the amount stored.
    pub fn add_food(&mut self, amount: f32) -> f32 {
        let space = (self.max_food - self.food).max(0.0);
        let stored = amount.max(0.0).min(space);
        self.food += stored;
        stored
    }

    /// Removes up to `amount`, returning the amount removed.
    pub fn remove_food(&mut self, amount: f32) -> f32 {
        let removed = amount.max(0.0).min(self.food);
        self.food -= removed;
        removed
    }

    pub fn fraction(&self) -> f32 {
        if self.max_food <= 0.0 {
            0.0
        } else {
            self.food / self.max_food
        }
    }
}

/// A harvested food item lying in the world
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub nutrition: f32,
}

/// What an entity is currently doing. Each state carries only the data it
/// needs; the renderer reads `label()`.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub enum BehaviorState {
    #[default]
    Idle,
    Eating,
    Resting,
    Searching,
    Moving { destination: (f32, f32) },
    Working { workplace: Entity },
    Investing { workplace: Entity },
    Shopping { workplace: Entity },
    Selling { workplace: Entity },
    Planting { farm: Entity },
    Harvesting { farm: Entity },
    Mating { partner: Entity },
    Gifting { target: Entity },
    Trading { partner: Entity },
    Stealing { victim: Entity },
    Fighting { victim: Entity },
    Dead,
}

impl BehaviorState {
    pub fn label(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Eating => "eating",
            BehaviorState::Resting => "resting",
            BehaviorState::Searching => "searching",
            BehaviorState::Moving { .. } => "moving",
            BehaviorState::Working { .. } => "working",
            BehaviorState::Investing { .. } => "investing",
            BehaviorState::Shopping { .. } => "shopping",
            BehaviorState::Selling { .. } => "selling",
            BehaviorState::Planting { .. } => "planting",
            BehaviorState::Harvesting { .. } => "harvesting",
            BehaviorState::Mating { .. } => "mating",
            BehaviorState::Gifting { .. } => "gifting",
            BehaviorState::Trading { .. } => "trading",
            BehaviorState::Stealing { .. } => "stealing",
            BehaviorState::Fighting { .. } => "fighting",
            BehaviorState::Dead => "dead",
        }
    }

    /// Entity this state is directed at, if any
    pub fn target(&self) -> Option<Entity> {
        match *self {
            BehaviorState::Working { workplace }
            | BehaviorState::Investing { workplace }
            | BehaviorState::Shopping { workplace }
            | BehaviorState::Selling { workplace } => Some(workplace),
            BehaviorState::Planting { farm } | BehaviorState::Harvesting { farm } => Some(farm),
            BehaviorState::Mating { partner } | BehaviorState::Trading { partner } => Some(partner),
            BehaviorState::Gifting { target } => Some(target),
            BehaviorState::Stealing { victim } | BehaviorState::Fighting { victim } => Some(victim),
            _ => None,
        }
    }
}
