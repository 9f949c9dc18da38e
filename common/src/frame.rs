use bytes::Bytes;
use image::{ImageReader, RgbImage};
use std::io::Cursor;

/// A single camera frame as delivered by a capture backend.
///
/// The payload stays JPEG-encoded until something needs pixels, so cloning a
/// frame out of the latest-frame slot only bumps a reference count.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Bytes,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl CapturedFrame {
    pub fn new(jpeg: impl Into<Bytes>, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            jpeg: jpeg.into(),
            captured_at_ms,
            seq,
        }
    }

    /// Milliseconds elapsed between capture and `now_ms`. Never negative.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.captured_at_ms).max(0)
    }

    /// Decode the payload to an 8-bit RGB image.
    pub fn decode_rgb(&self) -> Result<RgbImage, FrameError> {
        decode_rgb(&self.jpeg)
    }
}

/// Decode any supported encoded image (JPEG in practice) to 8-bit RGB.
pub fn decode_rgb(data: &[u8]) -> Result<RgbImage, FrameError> {
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| FrameError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| FrameError::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame payload is empty")]
    Empty,
    #[error("failed to decode frame: {0}")]
    Decode(String),
}
