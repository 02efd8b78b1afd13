//! Render Snapshot
//!
//! Builds the read-only entity view a renderer draws from.

use bevy_ecs::prelude::*;
use society_events::{EntityKind, EntityView, RenderSnapshot};

use crate::components::{Agent, BehaviorState, FarmPlot, FoodItem, SimClock, Transform, Vitals, Workplace, WorldBounds};
use crate::events::logger::entity_id;
use crate::genetics::Genome;
use crate::scheduler::RenderDetail;
use crate::store::ComponentStore;

fn view(world: &World, entity: Entity, kind: EntityKind, state: &str, asset_key: String, alive: bool) -> Option<EntityView> {
    let (x, y) = world.get::<Transform>(entity)?.position();
    Some(EntityView {
        id: entity_id(entity),
        kind,
        x,
        y,
        state: state.to_string(),
        asset_key,
        alive,
    })
}

fn agent_view(world: &World, agent: Entity) -> Option<EntityView> {
    let alive = world.get::<Vitals>(agent).is_some_and(|v| v.alive);
    let state = world
        .get::<BehaviorState>(agent)
        .copied()
        .unwrap_or_default();
    let state = if alive { state.label() } else { BehaviorState::Dead.label() };
    let gender = world.get::<Genome>(agent).map_or("male", |g| g.gender.label());
    let asset = if alive {
        format!("person_{gender}")
    } else {
        "person_dead".to_string()
    };
    view(world, agent, EntityKind::Agent, state, asset, alive)
}

fn farm_view(world: &World, farm: Entity) -> Option<EntityView> {
    let state = world.get::<FarmPlot>(farm)?.state.label();
    view(world, farm, EntityKind::Farm, state, format!("farm_{state}"), true)
}

fn workplace_view(world: &World, workplace: Entity) -> Option<EntityView> {
    let state = world.get::<Workplace>(workplace)?.display_state().label();
    view(world, workplace, EntityKind::Workplace, state, format!("workplace_{state}"), true)
}

fn food_view(world: &World, food: Entity) -> Option<EntityView> {
    view(world, food, EntityKind::Food, "available", "food".to_string(), true)
}

/// Snapshot of every entity in the world
pub fn build_render_snapshot(world: &mut World) -> RenderSnapshot {
    build_render_snapshot_with(world, RenderDetail::Full)
}

/// Snapshot at the given level of detail. `Headless` yields an empty
/// entity list.
pub fn build_render_snapshot_with(world: &mut World, detail: RenderDetail) -> RenderSnapshot {
    let tick = world.get_resource::<SimClock>().map_or(0, |c| c.tick);
    let (width, height) = world
        .get_resource::<WorldBounds>()
        .map_or((0.0, 0.0), |b| (b.width, b.height));
    let mut snapshot = RenderSnapshot {
        tick,
        width,
        height,
        entities: Vec::new(),
    };
    if detail == RenderDetail::Headless {
        return snapshot;
    }

    let agents = world.entities_with::<With<Agent>>();
    snapshot
        .entities
        .extend(agents.into_iter().filter_map(|e| agent_view(world, e)));
    if detail == RenderDetail::Minimal {
        return snapshot;
    }

    let farms = world.entities_with::<With<FarmPlot>>();
    snapshot
        .entities
        .extend(farms.into_iter().filter_map(|e| farm_view(world, e)));
    let workplaces = world.entities_with::<With<Workplace>>();
    snapshot
        .entities
        .extend(workplaces.into_iter().filter_map(|e| workplace_view(world, e)));
    if detail == RenderDetail::Full {
        let food = world.entities_with::<With<FoodItem>>();
        snapshot
            .entities
            .extend(food.into_iter().filter_map(|e| food_view(world, e)));
    }
    snapshot
}
