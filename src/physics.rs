// --- File: physics.rs ---
// Bodies are addressed by `BodyHandle`, an index into a table the backend
// owns, so entity storage never holds solver-internal references.

use crate::config::SolverConfig;
use crate::error::{Result, SimError};
use glam::Vec2;
use rapier2d::prelude::*;
use std::num::NonZeroUsize;

/// Index into the backend's body table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

impl BodyHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Everything needed to create one circle body with a single fixture.
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub dynamic: bool,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl BodyDesc {
    pub fn check(&self) -> Result<()> {
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(SimError::InvalidRadius(self.radius));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err(SimError::InvalidPosition);
        }
        Ok(())
    }
}

/// Parameters of one fixed-timestep advance.
#[derive(Debug, Clone, Copy)]
pub struct StepParams {
    pub dt: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
}

impl From<&SolverConfig> for StepParams {
    fn from(config: &SolverConfig) -> Self {
        Self {
            dt: config.timestep,
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
        }
    }
}

pub trait PhysicsBackend {
    fn create_circle_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle>;

    /// Adds `force` at the world point `at`; consumed by the next `step`.
    fn apply_force(&mut self, handle: BodyHandle, force: Vec2, at: Vec2, wake: bool)
    -> Result<()>;

    fn apply_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec2,
        at: Vec2,
        wake: bool,
    ) -> Result<()>;

    /// Advances every body by `params.dt`, then clears accumulated forces.
    fn step(&mut self, params: &StepParams);

    fn position(&self, handle: BodyHandle) -> Result<Vec2>;

    fn velocity(&self, handle: BodyHandle) -> Result<Vec2>;

    fn body_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// RapierWorld
// ---------------------------------------------------------------------------

pub struct RapierWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    bodies: Vec<RigidBodyHandle>,
    max_bodies: usize,
}

impl RapierWorld {
    pub fn new(max_bodies: usize) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            bodies: Vec::new(),
            max_bodies,
        }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.max_bodies)
    }

    fn body(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.bodies
            .get(handle.index())
            .and_then(|&h| self.rigid_body_set.get(h))
            .ok_or(SimError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        let rapier_handle = *self
            .bodies
            .get(handle.index())
            .ok_or(SimError::UnknownBody(handle))?;
        self.rigid_body_set
            .get_mut(rapier_handle)
            .ok_or(SimError::UnknownBody(handle))
    }
}

impl PhysicsBackend for RapierWorld {
    fn create_circle_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle> {
        desc.check()?;
        if self.bodies.len() >= self.max_bodies || self.bodies.len() >= u32::MAX as usize {
            return Err(SimError::BodyLimit {
                limit: self.max_bodies,
            });
        }

        let builder = if desc.dynamic {
            RigidBodyBuilder::dynamic().linvel(vector![desc.velocity.x, desc.velocity.y])
        } else {
            RigidBodyBuilder::fixed()
        };
        let rb = builder
            .translation(vector![desc.position.x, desc.position.y])
            .build();
        let rapier_handle = self.rigid_body_set.insert(rb);

        let collider = ColliderBuilder::ball(desc.radius)
            .density(desc.density)
            .friction(desc.friction)
            .restitution(desc.restitution)
            .build();
        self.collider_set
            .insert_with_parent(collider, rapier_handle, &mut self.rigid_body_set);

        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(rapier_handle);
        Ok(handle)
    }

    fn apply_force(
        &mut self,
        handle: BodyHandle,
        force: Vec2,
        at: Vec2,
        wake: bool,
    ) -> Result<()> {
        let rb = self.body_mut(handle)?;
        rb.add_force_at_point(vector![force.x, force.y], point![at.x, at.y], wake);
        Ok(())
    }

    fn apply_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec2,
        at: Vec2,
        wake: bool,
    ) -> Result<()> {
        let rb = self.body_mut(handle)?;
        rb.apply_impulse_at_point(vector![impulse.x, impulse.y], point![at.x, at.y], wake);
        Ok(())
    }

    fn step(&mut self, params: &StepParams) {
        self.integration_params.dt = params.dt;
        match NonZeroUsize::new(params.velocity_iterations) {
            Some(iterations) => self.integration_params.num_solver_iterations = iterations,
            None => log::warn!(
                "velocity_iterations = 0 ignored, keeping {}",
                self.integration_params.num_solver_iterations
            ),
        }
        self.integration_params.num_internal_stabilization_iterations = params.position_iterations;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None, // query pipeline (unused)
            &(),  // physics hooks
            &(),  // events
        );

        // rapier keeps user forces across steps; one step consumes them
        for (_, rb) in self.rigid_body_set.iter_mut() {
            rb.reset_forces(false);
        }
    }

    fn position(&self, handle: BodyHandle) -> Result<Vec2> {
        let t = self.body(handle)?.translation();
        Ok(Vec2::new(t.x, t.y))
    }

    fn velocity(&self, handle: BodyHandle) -> Result<Vec2> {
        let v = self.body(handle)?.linvel();
        Ok(Vec2::new(v.x, v.y))
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

// ---------------------------------------------------------------------------
// Test backend
// ---------------------------------------------------------------------------
