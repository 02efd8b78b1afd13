//! Agricultural System
//!
//! Sewed farms accumulate growth on every agricultural update until they
//! yield. Harvesting turns the yield into food items scattered around the
//! plot; taking a crop someone else planted is reported as theft.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind};

use crate::brain::{MemoryEntry, MemoryKind};
use crate::components::{harvester_skill, FarmPlot, Harvest, Transform};
use crate::events::logger::{entity_id, record_event};
use crate::genetics::Genome;
use crate::setup::spawn_food;
use crate::store::ComponentStore;

use super::social::{report, SocialEvent};

pub mod agriculture_constants {
    /// Growth added to a sewed farm per agricultural update
    pub const GROWTH_PER_UPDATE: f32 = 1.0;
    /// Food items land within this offset of the farm
    pub const SCATTER: f32 = 20.0;
    pub const STOLE_CROPS_IMPORTANCE: f32 = 0.6;
}

/// Advances every sewed farm. Returns the number of farms that came into
/// yield on this update.
pub fn grow_farms(world: &mut World) -> usize {
    let mut ripened = 0;
    for farm in world.entities_with::<With<FarmPlot>>() {
        if let Some(mut plot) = world.get_mut::<FarmPlot>(farm) {
            if plot.accumulate_growth(agriculture_constants::GROWTH_PER_UPDATE) {
                ripened += 1;
            }
        }
    }
    if ripened > 0 {
        tracing::debug!(ripened, "farms came into yield");
    }
    ripened
}

/// Harvests `farm` on behalf of `harvester`, spawning the food items.
/// Returns `None` unless the farm was yielding.
pub fn harvest<R: Rng>(world: &mut World, farm: Entity, harvester: Entity, rng: &mut R) -> Option<Harvest> {
    use agriculture_constants::*;
    let skill = world
        .get::<Genome>(harvester)
        .map_or(1.0, |g| harvester_skill(g.learning_capacity, g.stamina));
    let harvest = world.get_mut::<FarmPlot>(farm)?.harvest(skill, rng)?;

    let (fx, fy) = world
        .get::<Transform>(farm)
        .map(|t| t.position())
        .unwrap_or_default();
    for _ in 0..harvest.item_count {
        let at = (
            fx + rng.gen_range(-SCATTER..=SCATTER),
            fy + rng.gen_range(-SCATTER..=SCATTER),
        );
        spawn_food(world, at, harvest.nutrition_per_item);
    }

    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Harvest)
            .with_actor(entity_id(harvester))
            .with_target(entity_id(farm))
            .with_amount(harvest.total_yield)
    });

    if let Some(owner) = harvest.planted_by.filter(|owner| *owner != harvester) {
        report(
            world,
            SocialEvent::CropTheft {
                thief: harvester,
                owner,
                farm,
            },
        );
        let time = crate::actions::now(world);
        let entry = MemoryEntry::new(MemoryKind::StoleCrops, STOLE_CROPS_IMPORTANCE, time)
            .at(fx, fy)
            .about(owner);
        crate::actions::remember(world, harvester, entry);
    }
    Some(harvest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{FarmState, FoodItem};
    use crate::config::SimConfig;
    use crate::setup::{insert_resources, spawn_farm};
    use crate::systems::social::SocialEvents;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn world() -> World {
        let mut world = World::new();
        insert_resources(&mut world, &SimConfig::default());
        world
    }

    #[test]
    fn test_farm_yields_after_growth_time_updates() {
        let mut world = world();
        let farm = spawn_farm(&mut world, (100.0, 100.0));
        world
            .get_mut::<FarmPlot>(farm)
            .unwrap()
            .plant(Entity::from_raw(99));
        for _ in 0..9 {
            assert_eq!(grow_farms(&mut world), 0);
        }
        assert_eq!(grow_farms(&mut world), 1);
        assert_eq!(world.get::<FarmPlot>(farm).unwrap().state, FarmState::Yield);
        assert_eq!(grow_farms(&mut world), 0);
    }

    #[test]
    fn test_tilth_farms_do_not_grow() {
        let mut world = world();
        let farm = spawn_farm(&mut world, (100.0, 100.0));
        for _ in 0..20 {
            grow_farms(&mut world);
        }
        assert_eq!(world.get::<FarmPlot>(farm).unwrap().state, FarmState::Tilth);
    }

    #[test]
    fn test_harvest_spawns_food_and_flags_theft() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = world();
        let owner = world.spawn_empty().id();
        let thief = world.spawn_empty().id();
        let farm = spawn_farm(&mut world, (100.0, 100.0));
        {
            let mut plot = world.get_mut::<FarmPlot>(farm).unwrap();
            plot.plant(owner);
            plot.accumulate_growth(100.0);
        }

        let harvest = harvest(&mut world, farm, thief, &mut rng).unwrap();
        let items = world.entities_with::<With<FoodItem>>();
        assert_eq!(items.len() as u32, harvest.item_count);
        let total: f32 = items
            .iter()
            .map(|e| world.get::<FoodItem>(*e).unwrap().nutrition)
            .sum();
        assert!((total - harvest.total_yield).abs() < 1e-3);
        assert_eq!(world.resource::<SocialEvents>().len(), 1);
        assert!(world.get::<FarmPlot>(farm).unwrap().is_tilth());
    }

    #[test]
    fn test_harvest_own_farm_is_not_theft() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = world();
        let owner = world.spawn_empty().id();
        let farm = spawn_farm(&mut world, (100.0, 100.0));
        {
            let mut plot = world.get_mut::<FarmPlot>(farm).unwrap();
            plot.plant(owner);
            plot.accumulate_growth(100.0);
        }
        assert!(harvest(&mut world, farm, owner, &mut rng).is_some());
        assert!(world.resource::<SocialEvents>().is_empty());
        assert!(harvest(&mut world, farm, owner, &mut rng).is_none());
    }
}
