//! Spatial Grid
//!
//! Uniform grid over the world rectangle. Every tracked entity sits in
//! exactly one cell; a reverse map makes insert, update and remove O(1).
//! `query_radius` is cell-granular, `query_within` filters by true distance.

use bevy_ecs::prelude::*;
use std::collections::{BTreeSet, HashMap};

use crate::components::Tag;

pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    cell: Cell,
    x: f32,
    y: f32,
}

/// Uniform-cell spatial index resource
#[derive(Resource, Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cols: i32,
    rows: i32,
    cells: HashMap<Cell, BTreeSet<Entity>>,
    slots: HashMap<Entity, Slot>,
}

impl SpatialGrid {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        Self {
            cell_size,
            cols: ((width / cell_size).ceil() as i32).max(1),
            rows: ((height / cell_size).ceil() as i32).max(1),
            cells: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.cols, self.rows)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.slots.contains_key(&entity)
    }

    /// Cell for a position; out-of-world positions land in the border cells.
    pub fn cell_for(&self, x: f32, y: f32) -> Cell {
        let cx = (x / self.cell_size).floor() as i32;
        let cy = (y / self.cell_size).floor() as i32;
        (cx.clamp(0, self.cols - 1), cy.clamp(0, self.rows - 1))
    }

    /// Cell currently holding `entity`
    pub fn cell_of(&self, entity: Entity) -> Option<Cell> {
        self.slots.get(&entity).map(|s| s.cell)
    }

    pub fn position_of(&self, entity: Entity) -> Option<(f32, f32)> {
        self.slots.get(&entity).map(|s| (s.x, s.y))
    }

    /// Number of entities in a cell
    pub fn occupancy(&self, cell: Cell) -> usize {
        self.cells.get(&cell).map_or(0, |c| c.len())
    }

    pub fn insert(&mut self, entity: Entity, x: f32, y: f32) {
        self.update(entity, x, y);
    }

    /// Moves `entity` to its new position. Entities not yet tracked are
    /// inserted.
    pub fn update(&mut self, entity: Entity, x: f32, y: f32) {
        let cell = self.cell_for(x, y);
        let old = match self.slots.insert(entity, Slot { cell, x, y }) {
            Some(previous) => previous.cell,
            None => {
                self.cells.entry(cell).or_default().insert(entity);
                return;
            }
        };
        if old == cell {
            return;
        }
        if let Some(set) = self.cells.get_mut(&old) {
            set.remove(&entity);
            if set.is_empty() {
                self.cells.remove(&old);
            }
        }
        self.cells.entry(cell).or_default().insert(entity);
    }

    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slots.remove(&entity) else {
            return false;
        };
        if let Some(set) = self.cells.get_mut(&slot.cell) {
            set.remove(&entity);
            if set.is_empty() {
                self.cells.remove(&slot.cell);
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.slots.clear();
    }

    /// Every entity in a cell overlapping the square around `(x, y)`.
    /// Results may lie farther than `radius`; callers filter by distance.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<Entity> {
        let radius = radius.max(0.0);
        let (min_x, min_y) = self.cell_for(x - radius, y - radius);
        let (max_x, max_y) = self.cell_for(x + radius, y + radius);

        let mut found = Vec::new();
        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                if let Some(set) = self.cells.get(&(cx, cy)) {
                    found.extend(set.iter().copied());
                }
            }
        }
        found
    }

    /// Entities whose tracked position lies within `radius`, nearest first.
    pub fn query_within(&self, x: f32, y: f32, radius: f32) -> Vec<(Entity, f32)> {
        let mut hits: Vec<(Entity, f32)> = self
            .query_radius(x, y, radius)
            .into_iter()
            .filter_map(|e| {
                let slot = self.slots.get(&e)?;
                let d = ((slot.x - x).powi(2) + (slot.y - y).powi(2)).sqrt();
                (d <= radius).then_some((e, d))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    /// Nearest entity within `radius` accepted by `filter`.
    pub fn find_nearest(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        filter: impl Fn(Entity) -> bool,
    ) -> Option<(Entity, f32)> {
        self.query_within(x, y, radius)
            .into_iter()
            .find(|(e, _)| filter(*e))
    }
}

/// Entities with `tag` within `radius` of `(x, y)`, nearest first.
pub fn query_by_tag(world: &World, x: f32, y: f32, radius: f32, tag: Tag) -> Vec<(Entity, f32)> {
    let Some(grid) = world.get_resource::<SpatialGrid>() else {
        return Vec::new();
    };
    grid.query_within(x, y, radius)
        .into_iter()
        .filter(|(e, _)| world.get::<Tag>(*e) == Some(&tag))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn grid() -> SpatialGrid {
        SpatialGrid::new(1000.0, 500.0, 100.0)
    }

    #[test]
    fn test_dimensions_round_up() {
        let g = SpatialGrid::new(1280.0, 720.0, 100.0);
        assert_eq!(g.dimensions(), (13, 8));
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut g = grid();
        let e = Entity::from_raw(1);
        g.insert(e, 10.0, 10.0);
        assert_eq!(g.cell_of(e), Some((0, 0)));

        g.update(e, 250.0, 420.0);
        assert_eq!(g.cell_of(e), Some((2, 4)));
        assert_eq!(g.occupancy((0, 0)), 0);
        assert_eq!(g.occupancy((2, 4)), 1);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_out_of_bounds_positions_are_clamped() {
        let mut g = grid();
        let e = Entity::from_raw(1);
        g.insert(e, -50.0, 9000.0);
        assert_eq!(g.cell_of(e), Some((0, 4)));
    }

    #[test]
    fn test_remove() {
        let mut g = grid();
        let e = Entity::from_raw(5);
        g.insert(e, 300.0, 300.0);
        assert!(g.remove(e));
        assert!(!g.remove(e));
        assert!(g.query_radius(300.0, 300.0, 10.0).is_empty());
        assert_eq!(g.cell_of(e), None);
    }

    #[test]
    fn test_query_within_filters_and_sorts() {
        let mut g = grid();
        let near = Entity::from_raw(1);
        let mid = Entity::from_raw(2);
        let far = Entity::from_raw(3);
        g.insert(near, 105.0, 100.0);
        g.insert(mid, 130.0, 100.0);
        g.insert(far, 190.0, 190.0);

        let hits = g.query_within(100.0, 100.0, 50.0);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![near, mid]);
        // cell-granular query still reports the far entity
        assert!(g.query_radius(100.0, 100.0, 50.0).contains(&far));

        let nearest = g.find_nearest(100.0, 100.0, 50.0, |e| e != near);
        assert_eq!(nearest.map(|n| n.0), Some(mid));
    }

    #[test]
    fn test_query_by_tag() {
        let mut world = World::new();
        let mut g = grid();
        let farm = world.spawn(Tag::Farm).id();
        let agent = world.spawn(Tag::Agent).id();
        g.insert(farm, 50.0, 50.0);
        g.insert(agent, 40.0, 40.0);
        world.insert_resource(g);

        let farms = query_by_tag(&world, 45.0, 45.0, 30.0, Tag::Farm);
        assert_eq!(farms.len(), 1);
        assert_eq!(farms[0].0, farm);
        assert!(query_by_tag(&world, 45.0, 45.0, 30.0, Tag::Workplace).is_empty());
    }

    #[test]
    fn test_containment_after_random_moves() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut g = grid();
        let entities: Vec<Entity> = (0..50).map(Entity::from_raw).collect();
        let mut positions = Vec::new();
        for e in &entities {
            let p = (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..500.0));
            g.insert(*e, p.0, p.1);
            positions.push(p);
        }
        for _ in 0..500 {
            let i = rng.gen_range(0..entities.len());
            let p = (rng.gen_range(-100.0..1100.0), rng.gen_range(-100.0..600.0));
            g.update(entities[i], p.0, p.1);
            positions[i] = p;
        }
        for (e, p) in entities.iter().zip(&positions) {
            assert!(g.query_radius(p.0, p.1, 0.0).contains(e));
        }
        let total: usize = (0..10)
            .flat_map(|x| (0..5).map(move |y| (x, y)))
            .map(|c| g.occupancy(c))
            .sum();
        assert_eq!(total, entities.len());
    }
}
