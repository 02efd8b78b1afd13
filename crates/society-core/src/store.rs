//! Component Store
//!
//! A thin capability layer over `bevy_ecs::World`. Entity ids are bevy's
//! generation-tagged `Entity` values, so a despawned id never aliases a
//! later spawn. Lookups on missing entities or components return `None`.

use bevy_ecs::prelude::*;
use bevy_ecs::query::QueryFilter;

use crate::spatial::SpatialGrid;

/// Entity/component operations used by every system
pub trait ComponentStore {
    fn create_entity(&mut self) -> Entity;

    /// Attaches (or replaces) a component. Returns false if the entity is gone.
    fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> bool;

    fn get_component<C: Component>(&self, entity: Entity) -> Option<&C>;

    fn get_component_mut<C: Component>(&mut self, entity: Entity) -> Option<Mut<'_, C>>;

    fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.get_component::<C>(entity).is_some()
    }

    /// Despawns the entity with all its components and drops it from the
    /// spatial grid. Returns false if it did not exist.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Entities matching the filter, in ascending id order.
    fn entities_with<F: QueryFilter>(&mut self) -> Vec<Entity>;
}

impl ComponentStore for World {
    fn create_entity(&mut self) -> Entity {
        self.spawn_empty().id()
    }

    fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> bool {
        match self.get_entity_mut(entity) {
            Some(mut e) => {
                e.insert(component);
                true
            }
            None => false,
        }
    }

    fn get_component<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.get::<C>(entity)
    }

    fn get_component_mut<C: Component>(&mut self, entity: Entity) -> Option<Mut<'_, C>> {
        self.get_mut::<C>(entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        if let Some(mut grid) = self.get_resource_mut::<SpatialGrid>() {
            grid.remove(entity);
        }
        self.despawn(entity)
    }

    fn entities_with<F: QueryFilter>(&mut self) -> Vec<Entity> {
        let mut query = self.query_filtered::<Entity, F>();
        let mut entities: Vec<Entity> = query.iter(self).collect();
        entities.sort();
        entities
    }
}
