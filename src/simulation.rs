// --- File: simulation.rs ---
use crate::behavior::ForceStage;
use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::physics::{PhysicsBackend, RapierWorld, StepParams};
use crate::random::{RandomField, SimRng};
use crate::recorder::Recorder;
use crate::registry::BodyRegistry;
use crate::render::{RenderSink, submit_entities};
use rand::Rng;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

impl RunState {
    pub fn toggled(self) -> Self {
        match self {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Paused,
    Stepped { frame: u64 },
}

/// Owns the physics world and everything simulated in it, and advances the
/// whole population by one fixed step per running frame.
pub struct Simulation<P: PhysicsBackend = RapierWorld, R: Rng = SimRng> {
    world: P,
    registry: BodyRegistry,
    field: RandomField<R>,
    forces: ForceStage,
    recorder: Option<Recorder>,
    step_params: StepParams,
    state: RunState,
    steps: u64,
    frame_index: u64,
}

impl Simulation<RapierWorld, SimRng> {
    /// Builds the rapier world and spawns the configured scene.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let field = match config.seed {
            Some(seed) => RandomField::seeded(seed),
            None => RandomField::from_entropy(),
        };
        let world = RapierWorld::from_config(&config.solver);
        Self::with_parts(config, world, field)
    }
}

impl<P: PhysicsBackend, R: Rng> Simulation<P, R> {
    pub fn with_parts(config: &SimulationConfig, mut world: P, mut field: RandomField<R>) -> Result<Self> {
        config.validate()?;

        let mut registry = BodyRegistry::new(config.body.clone());
        let scene = &config.scene;
        registry.spawn_batch(&mut world, &mut field, scene.cell_count, scene.spawn_range)?;
        for &position in &scene.food_positions {
            let id = registry.spawn_food(&mut world, position)?;
            if scene.food_impulse != glam::Vec2::ZERO {
                registry.apply_impulse_to(&mut world, id, scene.food_impulse)?;
            }
        }
        log::info!(
            "Spawned {} cells and {} food ({} bodies)",
            registry.cells().len(),
            registry.food().len(),
            world.body_count()
        );

        let state = if config.start_paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        Ok(Self {
            world,
            registry,
            field,
            forces: ForceStage::new(config.behavior.clone()),
            recorder: Recorder::from_config(&config.recorder),
            step_params: StepParams::from(&config.solver),
            state,
            steps: 0,
            frame_index: 0,
        })
    }

    pub fn toggle_pause(&mut self) {
        self.state = self.state.toggled();
        log::info!(
            "Simulation {}",
            match self.state {
                RunState::Paused => "Paused",
                RunState::Running => "Resumed",
            }
        );
    }

    // Behavior, one physics step and the sync pass; pause is checked by the caller
    fn step(&mut self) -> Result<()> {
        self.forces.compute(&self.registry, &mut self.field);
        self.forces.apply(&self.registry, &mut self.world)?;
        self.world.step(&self.step_params);
        self.registry.sync(&self.world)?;
        self.steps += 1;
        Ok(())
    }

    /// Runs one frame. While paused nothing is computed, stepped or drawn.
    pub fn run_frame<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> Result<FrameOutcome> {
        if self.state == RunState::Paused {
            return Ok(FrameOutcome::Paused);
        }

        self.step()?;

        sink.clear();
        submit_entities(sink, self.registry.cells());
        submit_entities(sink, self.registry.food());
        sink.present()?;

        let frame = self.frame_index;
        if let Some(recorder) = &self.recorder {
            let image = match sink.snapshot()? {
                Some(image) => image,
                None => {
                    // A skipped present (e.g. surface reconfigured) gets one retry
                    log::warn!("Frame {} not captured, presenting again", frame);
                    sink.present()?;
                    sink.snapshot()?.ok_or(SimError::SnapshotUnavailable)?
                }
            };
            recorder.record(&image, frame)?;
        }
        self.frame_index += 1;

        log::debug!("Frame {} done, {} steps", frame, self.steps);
        Ok(FrameOutcome::Stepped { frame })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn simulated_time(&self) -> f32 {
        self.steps as f32 * self.step_params.dt
    }

    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    pub fn world(&self) -> &P {
        &self.world
    }

    pub fn recording(&self) -> bool {
        self.recorder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForcePolicy;
    use crate::physics::fake::FakeWorld;
    use crate::render::RecordingSink;
    use glam::{Vec2, Vec3};

    fn small_config(cells: usize) -> SimulationConfig {
        let mut config = SimulationConfig::new();
        config.scene.cell_count = cells;
        config.scene.spawn_range = Vec2::splat(2.0);
        config.scene.food_positions = vec![Vec2::ZERO];
        config.scene.food_impulse = Vec2::ZERO;
        config
    }

    fn fake_sim(config: &SimulationConfig) -> Simulation<FakeWorld> {
        Simulation::with_parts(config, FakeWorld::default(), RandomField::seeded(17)).unwrap()
    }

    #[test]
    fn starts_paused_and_does_nothing() {
        let mut sim = fake_sim(&small_config(10));
        let mut sink = RecordingSink::default();
        assert_eq!(sim.state(), RunState::Paused);
        for _ in 0..5 {
            assert_eq!(sim.run_frame(&mut sink).unwrap(), FrameOutcome::Paused);
        }
        assert_eq!(sim.steps(), 0);
        assert_eq!(sim.world().steps, 0);
        assert_eq!(sink.presents, 0);
        assert_eq!(sink.circles.len(), 0);
    }

    #[test]
    fn pause_stops_steps_and_resume_does_not_catch_up() {
        let mut sim = fake_sim(&small_config(10));
        let mut sink = RecordingSink::default();
        sim.toggle_pause();

        for _ in 0..3 {
            sim.run_frame(&mut sink).unwrap();
        }
        assert_eq!(sim.steps(), 3);

        sim.toggle_pause();
        for _ in 0..10 {
            sim.run_frame(&mut sink).unwrap();
        }
        assert_eq!(sim.steps(), 3);

        sim.toggle_pause();
        assert_eq!(
            sim.run_frame(&mut sink).unwrap(),
            FrameOutcome::Stepped { frame: 3 }
        );
        assert_eq!(sim.steps(), 4);
        assert_eq!(sim.world().steps, 4);
    }

    #[test]
    fn running_frame_draws_every_entity() {
        let mut sim = fake_sim(&small_config(25));
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        sim.run_frame(&mut sink).unwrap();

        assert_eq!(sink.clears, 1);
        assert_eq!(sink.presents, 1);
        assert_eq!(sink.circles.len(), 26);
        let yellow = Vec3::new(1.0, 1.0, 0.0);
        let (cells, food): (Vec<_>, Vec<_>) =
            sink.circles.iter().partition(|(_, _, color)| *color != yellow);
        assert_eq!(cells.len(), 25);
        assert_eq!(food.len(), 1);
        assert!(cells.iter().all(|(_, r, _)| *r == 0.02));
        assert_eq!(food[0].1, 0.6);
    }

    #[test]
    fn positions_match_world_after_each_frame() {
        let mut sim = fake_sim(&small_config(40));
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        for _ in 0..20 {
            sim.run_frame(&mut sink).unwrap();
            let registry = sim.registry();
            for entity in registry.cells().iter().chain(registry.food()) {
                let truth = sim.world().position(entity.body()).unwrap();
                assert!((entity.position - truth).length() < 1e-6);
            }
        }
    }

    #[test]
    fn drawn_positions_are_post_step() {
        let mut sim = fake_sim(&small_config(5));
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        sim.run_frame(&mut sink).unwrap();
        for (entity, (center, _, _)) in sim.registry().cells().iter().zip(&sink.circles) {
            assert_eq!(entity.position, *center);
        }
    }

    #[test]
    fn compute_only_policy_never_touches_bodies() {
        let mut config = small_config(10);
        config.behavior.policy = ForcePolicy::ComputeOnly;
        let mut sim = fake_sim(&config);
        let start: Vec<Vec2> = sim.registry().cells().iter().map(|c| c.position).collect();
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        for _ in 0..30 {
            sim.run_frame(&mut sink).unwrap();
        }
        assert_eq!(sim.world().forces_applied, 0);
        for (cell, p) in sim.registry().cells().iter().zip(start) {
            assert_eq!(cell.position, p);
        }
    }

    #[test]
    fn frame_counter_and_clock_advance_together() {
        let mut sim = fake_sim(&small_config(3));
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        for expected in 0..60 {
            assert_eq!(
                sim.run_frame(&mut sink).unwrap(),
                FrameOutcome::Stepped { frame: expected }
            );
        }
        assert_eq!(sim.frame_index(), 60);
        assert!((sim.simulated_time() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn recording_without_snapshot_fails_loudly() {
        let mut config = small_config(3);
        config.recorder.enabled = true;
        config.recorder.output_dir = std::env::temp_dir()
            .join("cellfield_no_snapshot")
            .to_string_lossy()
            .into_owned();
        let mut sim = fake_sim(&config);
        assert!(sim.recording());
        let mut sink = RecordingSink::default();
        sim.toggle_pause();
        let err = sim.run_frame(&mut sink).unwrap_err();
        assert!(matches!(err, SimError::SnapshotUnavailable));
        assert_eq!(sim.frame_index(), 0);
    }

    /// Drops the capture of its first present, like a surface that had to be
    /// reconfigured.
    #[derive(Default)]
    struct FlakySink {
        presents: usize,
        captured: Option<image::RgbaImage>,
    }

    impl RenderSink for FlakySink {
        fn clear(&mut self) {}

        fn draw_circle(&mut self, _center: Vec2, _radius: f32, _color: Vec3) {}

        fn present(&mut self) -> Result<()> {
            self.presents += 1;
            if self.presents > 1 {
                self.captured = Some(image::RgbaImage::new(2, 2));
            }
            Ok(())
        }

        fn snapshot(&mut self) -> Result<Option<image::RgbaImage>> {
            Ok(self.captured.take())
        }
    }

    #[test]
    fn missed_capture_is_presented_again() {
        let dir = std::env::temp_dir().join("cellfield_capture_retry");
        let mut config = small_config(3);
        config.recorder.enabled = true;
        config.recorder.output_dir = dir.to_string_lossy().into_owned();
        let mut sim = fake_sim(&config);
        let mut sink = FlakySink::default();
        sim.toggle_pause();

        assert_eq!(
            sim.run_frame(&mut sink).unwrap(),
            FrameOutcome::Stepped { frame: 0 }
        );
        assert_eq!(sink.presents, 2);
        assert!(dir.join("output_0000.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn spawn_failure_aborts_construction() {
        let config = small_config(50);
        let result = Simulation::with_parts(&config, FakeWorld::with_limit(20), RandomField::seeded(1));
        assert!(matches!(result, Err(SimError::BodyLimit { limit: 20 })));
    }

    #[test]
    fn food_impulse_is_applied_at_spawn() {
        let mut config = small_config(0);
        config.scene.food_impulse = Vec2::new(10.0, 0.0);
        let sim = fake_sim(&config);
        let food = &sim.registry().food()[0];
        assert!(sim.world().velocity(food.body()).unwrap().x > 0.0);
    }
}
