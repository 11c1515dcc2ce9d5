// --- File: config.rs ---
use crate::constants::*;
use crate::error::{Result, SimError};
use glam::{Vec2, Vec3};

/// Fixture parameters shared by every body the registry creates.
#[derive(Debug, Clone)]
pub struct BodyConfig {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub cell_radius: f32,
    pub food_radius: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            density: BODY_DENSITY,
            friction: BODY_FRICTION,
            restitution: BODY_RESTITUTION,
            cell_radius: CELL_RADIUS,
            food_radius: FOOD_RADIUS,
        }
    }
}

/// Whether computed steering forces reach the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcePolicy {
    Apply,
    ComputeOnly,
}

#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub noise_magnitude: f32,
    pub attraction_radius: f32,
    pub attraction_gain: f32,
    // Pull toward nearby cells; off unless explicitly enabled
    pub cohesion_enabled: bool,
    pub cohesion_radius: f32,
    pub cohesion_gain: f32,
    pub policy: ForcePolicy,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            noise_magnitude: NOISE_MAGNITUDE,
            attraction_radius: ATTRACTION_RADIUS,
            attraction_gain: ATTRACTION_GAIN,
            cohesion_enabled: false,
            cohesion_radius: COHESION_RADIUS,
            cohesion_gain: COHESION_GAIN,
            policy: ForcePolicy::Apply,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub timestep: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub max_bodies: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timestep: FIXED_TIMESTEP,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,
            max_bodies: MAX_BODIES,
        }
    }
}

/// Initial population layout.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub cell_count: usize,
    pub spawn_range: Vec2,
    pub food_positions: Vec<Vec2>,
    pub food_impulse: Vec2,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            cell_count: INITIAL_CELL_COUNT,
            spawn_range: Vec2::splat(CELL_SPAWN_RANGE),
            food_positions: vec![Vec2::from(FOOD_SPAWN_POSITION)],
            food_impulse: Vec2::from(FOOD_INITIAL_IMPULSE),
        }
    }
}

/// Static per session; never updated on resize.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub z_near: f32,
    pub z_far: f32,
    pub fovy_degrees: f32,
    pub aspect: f32,
    pub eye: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            z_near: CAMERA_Z_NEAR,
            z_far: CAMERA_Z_FAR,
            fovy_degrees: CAMERA_FOVY_DEGREES,
            aspect: CAMERA_ASPECT,
            eye: Vec3::from(CAMERA_EYE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub enabled: bool,
    pub output_dir: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: RECORDER_OUTPUT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub body: BodyConfig,
    pub behavior: BehaviorConfig,
    pub solver: SolverConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub recorder: RecorderConfig,
    /// `None` seeds the random stream from entropy.
    pub seed: Option<u64>,
    pub start_paused: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            body: BodyConfig::default(),
            behavior: BehaviorConfig::default(),
            solver: SolverConfig::default(),
            scene: SceneConfig::default(),
            camera: CameraConfig::default(),
            recorder: RecorderConfig::default(),
            seed: None,
            start_paused: true,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.body.cell_radius > 0.0) {
            return Err(SimError::InvalidRadius(self.body.cell_radius));
        }
        if !(self.body.food_radius > 0.0) {
            return Err(SimError::InvalidRadius(self.body.food_radius));
        }
        if !(self.solver.timestep > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.solver.timestep
            )));
        }
        if self.solver.velocity_iterations == 0 {
            return Err(SimError::InvalidConfig(
                "velocity_iterations must be at least 1".to_string(),
            ));
        }
        if self.solver.position_iterations == 0 {
            return Err(SimError::InvalidConfig(
                "position_iterations must be at least 1".to_string(),
            ));
        }
        if self.behavior.attraction_radius < 0.0 || self.behavior.cohesion_radius < 0.0 {
            return Err(SimError::InvalidConfig(
                "interaction radii must not be negative".to_string(),
            ));
        }
        if self.scene.spawn_range.x < 0.0 || self.scene.spawn_range.y < 0.0 {
            return Err(SimError::InvalidConfig(
                "spawn range must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scene() {
        let config = SimulationConfig::new();
        assert_eq!(config.solver.velocity_iterations, 6);
        assert_eq!(config.solver.position_iterations, 2);
        assert!((config.solver.timestep - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(config.scene.cell_count, 32_000);
        assert_eq!(config.behavior.policy, ForcePolicy::Apply);
        assert!(!config.behavior.cohesion_enabled);
        assert!(!config.recorder.enabled);
        assert!(config.start_paused);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = SimulationConfig::new();
        config.body.cell_radius = 0.0;
        assert!(matches!(config.validate(), Err(SimError::InvalidRadius(_))));

        let mut config = SimulationConfig::new();
        config.solver.velocity_iterations = 0;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));

        let mut config = SimulationConfig::new();
        config.solver.position_iterations = 0;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));

        let mut config = SimulationConfig::new();
        config.solver.timestep = f32::NAN;
        assert!(config.validate().is_err());
    }
}
