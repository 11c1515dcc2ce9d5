// --- File: constants.rs ---
// --- Global Simulation Constants ---
pub const BACKGROUND_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};
pub const WINDOW_TITLE: &str = "cellfield";
pub const WINDOW_WIDTH: u32 = 1024;
pub const WINDOW_HEIGHT: u32 = 1024;
pub const FPS_UPDATE_INTERVAL_SECS: f64 = 4.0;

// --- Solver ---
pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;
pub const VELOCITY_ITERATIONS: usize = 6;
pub const POSITION_ITERATIONS: usize = 2;
pub const MAX_BODIES: usize = 1 << 20;

// --- Bodies ---
pub const BODY_DENSITY: f32 = 1.0;
pub const BODY_FRICTION: f32 = 0.3;
pub const BODY_RESTITUTION: f32 = 0.0;
pub const CELL_RADIUS: f32 = 0.02;
pub const FOOD_RADIUS: f32 = 0.6;

// --- Initial scene ---
pub const INITIAL_CELL_COUNT: usize = 32_000;
pub const CELL_SPAWN_RANGE: f32 = 20.0;
pub const FOOD_SPAWN_POSITION: [f32; 2] = [-10.5, 0.0];
pub const FOOD_INITIAL_IMPULSE: [f32; 2] = [10.0, 0.0];

// --- Behavior ---
pub const NOISE_MAGNITUDE: f32 = 1e-4;
pub const ATTRACTION_RADIUS: f32 = 0.1;
pub const ATTRACTION_GAIN: f32 = 1e-3;
pub const COHESION_RADIUS: f32 = 0.1;
pub const COHESION_GAIN: f32 = 0.01;

// --- Colors (RGB) ---
pub const CELL_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const FOOD_COLOR: [f32; 3] = [1.0, 1.0, 0.0];

// --- Camera ---
pub const CAMERA_Z_NEAR: f32 = 0.1;
pub const CAMERA_Z_FAR: f32 = 60.0;
pub const CAMERA_FOVY_DEGREES: f32 = 60.0;
pub const CAMERA_ASPECT: f32 = 1.0;
pub const CAMERA_EYE: [f32; 3] = [0.0, 0.0, 16.0];

// --- Frame export ---
pub const RECORDER_OUTPUT_DIR: &str = "Output";
