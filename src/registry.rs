// --- File: registry.rs ---
use crate::config::BodyConfig;
use crate::error::{Result, SimError};
use crate::physics::{BodyDesc, BodyHandle, PhysicsBackend};
use crate::random::RandomField;
use glam::Vec2;
use rand::Rng;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Cell,
    Food,
}

/// Stable address of an entity: its role plus its spawn index within that role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub kind: EntityKind,
    pub index: usize,
}

/// Logical mirror of one physics body.
#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    pub position: Vec2, // Overwritten from the solver after every step
    pub velocity: Vec2,
    radius: f32,
    body: BodyHandle,
}

impl Entity {
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }
}

/// Owns every cell and food entity. Entities are never removed; each one
/// maps to exactly one body in the physics world it was spawned into.
pub struct BodyRegistry {
    cells: Vec<Entity>,
    food: Vec<Entity>,
    body_config: BodyConfig,
}

impl BodyRegistry {
    pub fn new(body_config: BodyConfig) -> Self {
        Self {
            cells: Vec::new(),
            food: Vec::new(),
            body_config,
        }
    }

    pub fn spawn_entity<P: PhysicsBackend>(
        &mut self,
        world: &mut P,
        kind: EntityKind,
        position: Vec2,
        velocity: Vec2,
        radius: f32,
    ) -> Result<EntityId> {
        let desc = BodyDesc {
            position,
            velocity,
            radius,
            dynamic: true,
            density: self.body_config.density,
            friction: self.body_config.friction,
            restitution: self.body_config.restitution,
        };
        let body = world.create_circle_body(&desc)?;
        let entity = Entity {
            kind,
            position,
            velocity,
            radius,
            body,
        };

        let list = self.list_mut(kind);
        list.push(entity);
        Ok(EntityId {
            kind,
            index: list.len() - 1,
        })
    }

    /// Spawns `count` cells at rest, uniformly inside `range`. The first
    /// failed body creation aborts the batch.
    pub fn spawn_batch<P: PhysicsBackend, R: Rng>(
        &mut self,
        world: &mut P,
        field: &mut RandomField<R>,
        count: usize,
        range: Vec2,
    ) -> Result<()> {
        self.cells.reserve(count);
        let radius = self.body_config.cell_radius;
        for _ in 0..count {
            let position = field.position(range);
            self.spawn_entity(world, EntityKind::Cell, position, Vec2::ZERO, radius)?;
        }
        Ok(())
    }

    pub fn spawn_food<P: PhysicsBackend>(&mut self, world: &mut P, position: Vec2) -> Result<EntityId> {
        let radius = self.body_config.food_radius;
        self.spawn_entity(world, EntityKind::Food, position, Vec2::ZERO, radius)
    }

    /// Kicks an entity's body through its center.
    pub fn apply_impulse_to<P: PhysicsBackend>(
        &self,
        world: &mut P,
        id: EntityId,
        impulse: Vec2,
    ) -> Result<()> {
        let entity = self.get(id).ok_or_else(|| {
            SimError::InvalidConfig(format!("no {:?} entity at index {}", id.kind, id.index))
        })?;
        let center = world.position(entity.body)?;
        world.apply_impulse(entity.body, impulse, center, true)
    }

    /// Copies solver truth into every entity's position and velocity.
    pub fn sync<P: PhysicsBackend>(&mut self, world: &P) -> Result<()> {
        for entity in self.cells.iter_mut().chain(self.food.iter_mut()) {
            entity.position = world.position(entity.body)?;
            entity.velocity = world.velocity(entity.body)?;
        }
        Ok(())
    }

    pub fn cells(&self) -> &[Entity] {
        &self.cells
    }

    pub fn food(&self) -> &[Entity] {
        &self.food
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        match id.kind {
            EntityKind::Cell => self.cells.get(id.index),
            EntityKind::Food => self.food.get(id.index),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len() + self.food.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Cell => &mut self.cells,
            EntityKind::Food => &mut self.food,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::StepParams;
    use crate::physics::fake::FakeWorld;
    use std::collections::HashSet;

    fn step() -> StepParams {
        StepParams {
            dt: 1.0 / 60.0,
            velocity_iterations: 6,
            position_iterations: 2,
        }
    }

    #[test]
    fn spawn_entity_keeps_requested_radius() {
        let mut world = FakeWorld::default();
        let mut registry = BodyRegistry::new(BodyConfig::default());
        let id = registry
            .spawn_entity(&mut world, EntityKind::Food, Vec2::ZERO, Vec2::ZERO, 0.6)
            .unwrap();
        assert_eq!(id, EntityId { kind: EntityKind::Food, index: 0 });

        for _ in 0..100 {
            world.step(&step());
            registry.sync(&world).unwrap();
        }
        assert_eq!(registry.get(id).unwrap().radius(), 0.6);
    }

    #[test]
    fn spawn_batch_uses_cell_radius_and_range() {
        let mut world = FakeWorld::default();
        let mut field = RandomField::seeded(5);
        let mut registry = BodyRegistry::new(BodyConfig::default());
        registry
            .spawn_batch(&mut world, &mut field, 500, Vec2::splat(20.0))
            .unwrap();

        assert_eq!(registry.cells().len(), 500);
        assert_eq!(world.body_count(), 500);
        for cell in registry.cells() {
            assert_eq!(cell.kind, EntityKind::Cell);
            assert_eq!(cell.radius(), 0.02);
            assert_eq!(cell.velocity, Vec2::ZERO);
            assert!(cell.position.x.abs() <= 10.0 && cell.position.y.abs() <= 10.0);
        }
    }

    #[test]
    fn bodies_are_never_shared() {
        let mut world = FakeWorld::default();
        let mut field = RandomField::seeded(9);
        let mut registry = BodyRegistry::new(BodyConfig::default());
        registry
            .spawn_batch(&mut world, &mut field, 64, Vec2::splat(4.0))
            .unwrap();
        registry.spawn_food(&mut world, Vec2::ZERO).unwrap();

        let handles: HashSet<BodyHandle> = registry
            .cells()
            .iter()
            .chain(registry.food())
            .map(Entity::body)
            .collect();
        assert_eq!(handles.len(), registry.len());
        assert_eq!(world.body_count(), registry.len());
    }

    #[test]
    fn batch_aborts_on_body_limit() {
        let mut world = FakeWorld::with_limit(10);
        let mut field = RandomField::seeded(1);
        let mut registry = BodyRegistry::new(BodyConfig::default());
        let err = registry
            .spawn_batch(&mut world, &mut field, 25, Vec2::splat(2.0))
            .unwrap_err();
        assert!(matches!(err, SimError::BodyLimit { limit: 10 }));
        assert_eq!(registry.cells().len(), world.body_count());
    }

    #[test]
    fn sync_mirrors_solver_positions() {
        let mut world = FakeWorld::default();
        let mut registry = BodyRegistry::new(BodyConfig::default());
        let id = registry.spawn_food(&mut world, Vec2::new(1.0, 0.0)).unwrap();
        registry
            .apply_impulse_to(&mut world, id, Vec2::new(0.5, 0.25))
            .unwrap();
        world.step(&step());

        // Not synced yet: the mirror still holds the spawn position
        assert_eq!(registry.get(id).unwrap().position, Vec2::new(1.0, 0.0));

        registry.sync(&world).unwrap();
        let entity = registry.get(id).unwrap();
        let truth = world.position(entity.body()).unwrap();
        assert!((entity.position - truth).length() < 1e-6);
        assert!(entity.position.x > 1.0);
        assert_eq!(entity.velocity, world.velocity(entity.body()).unwrap());
    }

    #[test]
    fn impulse_to_missing_entity_fails() {
        let mut world = FakeWorld::default();
        let registry = BodyRegistry::new(BodyConfig::default());
        let missing = EntityId { kind: EntityKind::Food, index: 0 };
        assert!(registry
            .apply_impulse_to(&mut world, missing, Vec2::X)
            .is_err());
    }
}
