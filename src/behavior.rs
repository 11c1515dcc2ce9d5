// --- File: behavior.rs ---
use crate::config::{BehaviorConfig, ForcePolicy};
use crate::error::Result;
use crate::physics::PhysicsBackend;
use crate::random::RandomField;
use crate::registry::BodyRegistry;
use glam::Vec2;
use rand::Rng;
use rayon::prelude::*;
use std::collections::HashMap;

pub type GridKey = (i32, i32);

/// Sum of the attraction terms of every food position within `radius`.
#[inline]
pub fn attraction(cell: Vec2, food: &[Vec2], radius: f32, gain: f32) -> Vec2 {
    let mut force = Vec2::ZERO;
    for &f in food {
        if cell.distance(f) < radius {
            force += (f - cell) * gain;
        }
    }
    force
}

/// Uniform hash grid over cell positions, rebuilt every frame.
struct CellGrid {
    cell_size: f32,
    buckets: HashMap<GridKey, Vec<usize>>,
}

impl CellGrid {
    fn new() -> Self {
        Self {
            cell_size: 1.0,
            buckets: HashMap::new(),
        }
    }

    #[inline]
    fn key(&self, position: Vec2) -> GridKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    fn rebuild(&mut self, positions: &[Vec2], cell_size: f32) {
        self.cell_size = cell_size;
        // Drop cells nobody visited last frame, keep the rest allocated
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        for (index, &p) in positions.iter().enumerate() {
            let key = self.key(p);
            self.buckets.entry(key).or_default().push(index);
        }
    }

    fn cohesion(&self, index: usize, positions: &[Vec2], radius: f32, gain: f32) -> Vec2 {
        let pos = positions[index];
        let (cx, cy) = self.key(pos);
        let mut force = Vec2::ZERO;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(neighbors) = self.buckets.get(&(cx + dx, cy + dy)) {
                    for &j in neighbors {
                        if j == index {
                            continue;
                        }
                        let other = positions[j];
                        if pos.distance(other) < radius {
                            force += (other - pos) * gain;
                        }
                    }
                }
            }
        }
        force
    }
}

/// Per-frame steering forces for the cell population.
///
/// Computation and application are separate: [`ForceStage::compute`] only
/// reads the registry snapshot, [`ForceStage::apply`] writes the results
/// into the physics world one body at a time.
pub struct ForceStage {
    config: BehaviorConfig,
    positions: Vec<Vec2>,
    food_positions: Vec<Vec2>,
    noise: Vec<Vec2>,
    forces: Vec<Vec2>,
    grid: CellGrid,
}

impl ForceStage {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            positions: Vec::new(),
            food_positions: Vec::new(),
            noise: Vec::new(),
            forces: Vec::new(),
            grid: CellGrid::new(),
        }
    }

    /// Forces from the last `compute`, indexed like `registry.cells()`.
    pub fn forces(&self) -> &[Vec2] {
        &self.forces
    }

    pub fn compute<R: Rng>(&mut self, registry: &BodyRegistry, field: &mut RandomField<R>) -> &[Vec2] {
        self.positions.clear();
        self.positions
            .extend(registry.cells().iter().map(|c| c.position));
        self.food_positions.clear();
        self.food_positions
            .extend(registry.food().iter().map(|f| f.position));

        // Noise is drawn in cell order so a seeded field gives the same stream
        let magnitude = self.config.noise_magnitude;
        self.noise.clear();
        self.noise
            .extend((0..self.positions.len()).map(|_| field.direction() * magnitude));

        let cohesion = self.config.cohesion_enabled && self.config.cohesion_radius > 0.0;
        if cohesion {
            self.grid.rebuild(&self.positions, self.config.cohesion_radius);
        }

        let config = &self.config;
        let positions = &self.positions;
        let food = &self.food_positions;
        let grid = &self.grid;
        self.noise
            .par_iter()
            .enumerate()
            .map(|(i, &noise)| {
                let mut force = noise
                    + attraction(
                        positions[i],
                        food,
                        config.attraction_radius,
                        config.attraction_gain,
                    );
                if cohesion {
                    force += grid.cohesion(i, positions, config.cohesion_radius, config.cohesion_gain);
                }
                force
            })
            .collect_into_vec(&mut self.forces);

        &self.forces
    }

    /// Writes the last computed forces into `world` at each cell's position.
    /// Returns how many forces were applied.
    pub fn apply<P: PhysicsBackend>(&self, registry: &BodyRegistry, world: &mut P) -> Result<usize> {
        if self.config.policy == ForcePolicy::ComputeOnly {
            return Ok(0);
        }
        let mut applied = 0;
        for (cell, &force) in registry.cells().iter().zip(&self.forces) {
            world.apply_force(cell.body(), force, cell.position, true)?;
            applied += 1;
        }
        Ok(applied)
    }
}
