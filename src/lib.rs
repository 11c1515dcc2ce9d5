// One running frame: behavior forces, physics step, registry sync, render
// submission, driven by `simulation`.

pub mod behavior;
pub mod config;
pub mod constants;
pub mod error;
pub mod physics;
pub mod random;
pub mod recorder;
pub mod registry;
pub mod render;
pub mod renderer;
pub mod simulation;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use simulation::{FrameOutcome, RunState, Simulation};
