// --- File: error.rs ---
use crate::physics::BodyHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Body radius must be positive and finite, got {0}")]
    InvalidRadius(f32),

    #[error("Body position must be finite")]
    InvalidPosition,

    #[error("Physics world is full ({limit} bodies)")]
    BodyLimit { limit: usize },

    #[error("Unknown body handle: {0:?}")]
    UnknownBody(BodyHandle),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Recording is enabled but the renderer produced no frame snapshot")]
    SnapshotUnavailable,

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SimError>;
