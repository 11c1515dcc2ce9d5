// --- File: recorder.rs ---
use crate::config::RecorderConfig;
use crate::error::Result;
use std::path::PathBuf;

/// Writes presented frames as `<dir>/output_<NNNN>.png`.
pub struct Recorder {
    output_dir: PathBuf,
}

impl Recorder {
    /// `None` when recording is disabled.
    pub fn from_config(config: &RecorderConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(&config.output_dir))
    }

    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn frame_path(&self, frame_index: u64) -> PathBuf {
        self.output_dir.join(format!("output_{frame_index:04}.png"))
    }

    pub fn record(&self, image: &image::RgbaImage, frame_index: u64) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.frame_path(frame_index);
        image.save(&path)?;
        log::debug!("Recorded frame {} to {}", frame_index, path.display());
        Ok(path)
    }
}
