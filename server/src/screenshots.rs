use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory of annotated hit screenshots.
pub struct ScreenshotStore {
    dir: PathBuf,
    quality: u8,
}

impl ScreenshotStore {
    /// Creates the directory if needed.
    pub fn open(dir: &Path, quality: u8) -> Result<Self, ScreenshotError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| ScreenshotError::Io(dir.display().to_string(), e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quality,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode `img` as a new JPEG for `shooter` taken at `at` and return its
    /// file name. A name already on disk gets a `_2`, `_3`, ... suffix. On any
    /// failure no file is left behind.
    pub fn save_new(
        &self,
        shooter: &str,
        at: DateTime<Local>,
        img: &RgbImage,
    ) -> Result<String, ScreenshotError> {
        let (filename, file) = self.reserve(shooter, at)?;
        let path = self.dir.join(&filename);
        if let Err(e) = self.write_jpeg(file, &path, img) {
            if let Err(rm) = std::fs::remove_file(&path) {
                warn!(path = path.display().to_string(), error = %rm, "failed to remove partial screenshot");
            }
            return Err(e);
        }
        debug!(path = path.display().to_string(), "screenshot saved");
        Ok(filename)
    }

    /// Create the first free file name. `create_new` makes the claim atomic,
    /// so concurrent saves in the same second never share a file.
    fn reserve(&self, shooter: &str, at: DateTime<Local>) -> Result<(String, File), ScreenshotError> {
        let base = screenshot_filename(shooter, at);
        let stem = base.trim_end_matches(".jpg").to_string();
        let mut n = 1u32;
        loop {
            let name = if n == 1 {
                base.clone()
            } else {
                format!("{stem}_{n}.jpg")
            };
            let path = self.dir.join(&name);
            match File::create_new(&path) {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(ScreenshotError::Io(path.display().to_string(), e)),
            }
        }
    }

    fn write_jpeg(&self, file: File, path: &Path, img: &RgbImage) -> Result<(), ScreenshotError> {
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
            .map_err(|e| ScreenshotError::Encode(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| ScreenshotError::Io(path.display().to_string(), e))
    }

    pub fn remove(&self, filename: &str) {
        let path = self.dir.join(filename);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = path.display().to_string(), error = %e, "failed to delete screenshot");
        }
    }

    /// Delete every file in the directory. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, ScreenshotError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| ScreenshotError::Io(self.dir.display().to_string(), e))?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                std::fs::remove_file(&path)
                    .map_err(|e| ScreenshotError::Io(path.display().to_string(), e))?;
                removed += 1;
            }
        }
        info!(removed, dir = self.dir.display().to_string(), "screenshots cleared");
        Ok(removed)
    }
}

/// `{shooter}_{YYYYmmdd_HHMMSS}.jpg`, with characters that are unsafe in a
/// file name replaced by `_`.
pub fn screenshot_filename(shooter: &str, at: DateTime<Local>) -> String {
    let safe: String = shooter
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // A leading dot would make a hidden file, and ".." must never survive.
    let safe = safe.trim_start_matches('.');
    format!("{safe}_{}.jpg", at.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("screenshot I/O on {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to encode screenshot: {0}")]
    Encode(String),
}
