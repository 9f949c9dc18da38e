use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{self, ThresholdType};

use crate::DetectError;

// BT.601 luma weights in 14-bit fixed point: 0.299, 0.587, 0.114.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Per-pixel, per-channel absolute difference of two equally sized images.
pub fn abs_diff(background: &RgbImage, frame: &RgbImage) -> Result<RgbImage, DetectError> {
    if background.dimensions() != frame.dimensions() {
        return Err(DetectError::DimensionMismatch {
            background: background.dimensions(),
            frame: frame.dimensions(),
        });
    }

    let (width, height) = background.dimensions();
    let raw: Vec<u8> = background
        .as_raw()
        .iter()
        .zip(frame.as_raw())
        .map(|(&a, &b)| a.abs_diff(b))
        .collect();

    // Both buffers have width * height * 3 samples, so this cannot fail.
    RgbImage::from_raw(width, height, raw).ok_or(DetectError::DimensionMismatch {
        background: background.dimensions(),
        frame: frame.dimensions(),
    })
}

/// Collapse an RGB image to single-channel intensity.
pub fn intensity(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let luma =
            (r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT + ROUND) >> SHIFT;
        Luma([luma as u8])
    })
}

/// Binary threshold: strictly above `threshold` becomes 255, the rest 0.
pub fn threshold_binary(gray: &GrayImage, threshold: u8) -> GrayImage {
    contrast::threshold(gray, threshold, ThresholdType::Binary)
}
