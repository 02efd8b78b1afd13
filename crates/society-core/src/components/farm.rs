//! Farm Components
//!
//! A farm plot cycles tilth -> sewed -> yield -> tilth. Planting and
//! harvesting are the only ways to enter and leave the sewed/yield states;
//! growth accumulates only while sewed.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Constants for farming
pub mod farm_constants {
    /// Growth units needed before a sewed farm yields
    pub const GROWTH_TIME: f32 = 10.0;
    /// Growth added per agricultural update
    pub const GROWTH_SPEED: f32 = 1.0;
    pub const MAX_YIELD: f32 = 100.0;
    pub const BASE_FERTILITY: f32 = 1.0;
    /// Yield per food item when partitioning a harvest
    pub const YIELD_PER_ITEM: f32 = 20.0;
    /// Random multiplier range applied to every harvest
    pub const YIELD_VARIANCE: (f32, f32) = (0.8, 1.2);
}

/// Growth stage of a farm plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmState {
    #[default]
    Tilth,
    Sewed,
    Yield,
}

impl FarmState {
    pub fn label(self) -> &'static str {
        match self {
            FarmState::Tilth => "tilth",
            FarmState::Sewed => "sewed",
            FarmState::Yield => "yield",
        }
    }
}

/// A harvest split into equally nourishing food items
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harvest {
    pub total_yield: f32,
    pub item_count: u32,
    pub nutrition_per_item: f32,
    /// Who planted the crop, if anyone
    pub planted_by: Option<Entity>,
}

/// Farm plot state machine
#[derive(Component, Debug, Clone, PartialEq)]
pub struct FarmPlot {
    pub state: FarmState,
    pub growth: f32,
    pub growth_time: f32,
    pub growth_speed: f32,
    pub fertility: f32,
    pub max_yield: f32,
    pub planted_by: Option<Entity>,
    pub last_yield: f32,
    pub harvest_count: u32,
}

impl Default for FarmPlot {
    fn default() -> Self {
        use farm_constants::*;
        Self {
            state: FarmState::Tilth,
            growth: 0.0,
            growth_time: GROWTH_TIME,
            growth_speed: GROWTH_SPEED,
            fertility: BASE_FERTILITY,
            max_yield: MAX_YIELD,
            planted_by: None,
            last_yield: 0.0,
            harvest_count: 0,
        }
    }
}

impl FarmPlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tilth(&self) -> bool {
        self.state == FarmState::Tilth
    }

    pub fn has_yield(&self) -> bool {
        self.state == FarmState::Yield
    }

    /// tilth -> sewed. Returns false (and changes nothing) from any other state.
    pub fn plant(&mut self, planter: Entity) -> bool {
        if self.state != FarmState::Tilth {
            return false;
        }
        self.state = FarmState::Sewed;
        self.growth = 0.0;
        self.planted_by = Some(planter);
        true
    }

    /// Adds growth while sewed; flips to yield once the threshold is met.
    /// Returns true on the update that produced the yield.
    pub fn accumulate_growth(&mut self, dt: f32) -> bool {
        if self.state != FarmState::Sewed {
            return false;
        }
        self.growth += dt * self.growth_speed;
        if self.growth >= self.growth_time {
            self.state = FarmState::Yield;
            return true;
        }
        false
    }

    /// yield -> tilth, producing the harvest. `skill` scales the yield.
    pub fn harvest<R: Rng>(&mut self, skill: f32, rng: &mut R) -> Option<Harvest> {
        if self.state != FarmState::Yield {
            return None;
        }
        let (lo, hi) = farm_constants::YIELD_VARIANCE;
        let total_yield = self.max_yield * self.fertility * skill * rng.gen_range(lo..=hi);
        let item_count = ((total_yield / farm_constants::YIELD_PER_ITEM) as u32).max(1);
        let harvest = Harvest {
            total_yield,
            item_count,
            nutrition_per_item: total_yield / item_count as f32,
            planted_by: self.planted_by,
        };

        self.last_yield = total_yield;
        self.harvest_count += 1;
        self.reset();
        Some(harvest)
    }

    /// Returns the plot to bare tilth.
    pub fn reset(&mut self) {
        self.state = FarmState::Tilth;
        self.growth = 0.0;
        self.planted_by = None;
    }
}

/// Harvest multiplier from the harvester's genes.
pub fn harvester_skill(learning_capacity: f32, stamina: f32) -> f32 {
    1.0 + 0.3 * learning_capacity + 0.2 * stamina
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_full_cycle() {
        let mut rng = SmallRng::seed_from_u64(1);
        let planter = Entity::from_raw(7);
        let mut farm = FarmPlot::new();

        assert!(farm.plant(planter));
        assert_eq!(farm.state, FarmState::Sewed);
        assert_eq!(farm.planted_by, Some(planter));

        for _ in 0..9 {
            assert!(!farm.accumulate_growth(1.0));
        }
        assert!(farm.accumulate_growth(1.0));
        assert!(farm.has_yield());

        let harvest = farm.harvest(1.0, &mut rng).unwrap();
        assert!(harvest.total_yield >= 80.0 && harvest.total_yield <= 120.0);
        assert!(harvest.item_count >= 4 && harvest.item_count <= 6);
        let rebuilt = harvest.nutrition_per_item * harvest.item_count as f32;
        assert!((rebuilt - harvest.total_yield).abs() < 1e-3);
        assert_eq!(harvest.planted_by, Some(planter));

        assert!(farm.is_tilth());
        assert_eq!(farm.planted_by, None);
    }

    #[test]
    fn test_no_out_of_order_transitions() {
        let mut rng = SmallRng::seed_from_u64(2);
        let planter = Entity::from_raw(1);
        let mut farm = FarmPlot::new();

        // tilth: no growth, no harvest
        assert!(!farm.accumulate_growth(100.0));
        assert!(farm.harvest(1.0, &mut rng).is_none());
        assert!(farm.is_tilth());

        // sewed: no replant, no harvest
        farm.plant(planter);
        assert!(!farm.plant(planter));
        assert!(farm.harvest(1.0, &mut rng).is_none());
        assert_eq!(farm.state, FarmState::Sewed);

        // yield: no replant, no further growth
        farm.accumulate_growth(farm.growth_time);
        assert!(!farm.plant(planter));
        assert!(!farm.accumulate_growth(1.0));
        assert!(farm.has_yield());
    }

    #[test]
    fn test_small_harvest_still_yields_one_item() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut farm = FarmPlot {
            fertility: 0.05,
            ..FarmPlot::default()
        };
        farm.plant(Entity::from_raw(1));
        farm.accumulate_growth(farm.growth_time);
        let harvest = farm.harvest(1.0, &mut rng).unwrap();
        assert_eq!(harvest.item_count, 1);
        assert!((harvest.nutrition_per_item - harvest.total_yield).abs() < 1e-6);
    }

    #[test]
    fn test_harvester_skill() {
        assert!((harvester_skill(0.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((harvester_skill(1.0, 1.0) - 1.5).abs() < 1e-6);
    }
}
