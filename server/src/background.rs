use hitboard_common::frame::{decode_rgb, CapturedFrame, FrameError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// The stored reference frame. Each capture overwrites the previous one.
pub struct BackgroundStore {
    path: PathBuf,
}

impl BackgroundStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Persist the frame's JPEG bytes untouched, replacing any previous background.
    pub fn save(&self, frame: &CapturedFrame) -> Result<(), BackgroundError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &frame.jpeg)
            .map_err(|e| BackgroundError::Io(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| BackgroundError::Io(self.path.display().to_string(), e))?;
        info!(
            path = self.path.display().to_string(),
            seq = frame.seq,
            bytes = frame.jpeg.len(),
            "background captured"
        );
        Ok(())
    }

    /// `Ok(None)` when no background has been captured yet.
    pub fn load(&self) -> Result<Option<RgbImage>, BackgroundError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackgroundError::Io(self.path.display().to_string(), e)),
        };
        Ok(Some(decode_rgb(&data)?))
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("background I/O on {0}: {1}")]
    Io(String, std::io::Error),
    #[error("stored background is unreadable: {0}")]
    Frame(#[from] FrameError),
}
