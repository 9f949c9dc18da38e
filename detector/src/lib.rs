//! Background-subtraction hit detection.
//!
//! A hit is a connected region where the live frame differs from the stored
//! background by more than a fixed intensity threshold. Detection is a pure
//! function of its inputs:
//!
//! 1. per-channel absolute difference of background and frame
//! 2. BT.601 intensity of the difference
//! 3. global binary threshold (strictly greater than `threshold`)
//! 4. outer contours of the foreground regions
//! 5. for every contour enclosing more than `min_area`, the center of its
//!    bounding box
//!
//! Hits come back in contour discovery order, which follows a raster scan of
//! each region's first border pixel. Callers should not rely on any sorting.

pub mod annotate;
pub mod contour;
pub mod diff;

use image::RgbImage;
use tracing::debug;

pub use annotate::{annotate_hits, AnnotationStyle};

/// Center of one detected difference region, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitPoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    /// Intensity a difference pixel must exceed to count as foreground.
    pub threshold: u8,
    /// Contours must enclose strictly more than this many square pixels.
    pub min_area: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold: 50,
            min_area: 50.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("background is {}x{} but frame is {}x{}", background.0, background.1, frame.0, frame.1)]
    DimensionMismatch {
        background: (u32, u32),
        frame: (u32, u32),
    },
    #[error("failed to load label font: {0}")]
    Font(String),
}

pub fn detect_hits(
    background: &RgbImage,
    frame: &RgbImage,
    params: &DetectorParams,
) -> Result<Vec<HitPoint>, DetectError> {
    let difference = diff::abs_diff(background, frame)?;
    let gray = diff::intensity(&difference);
    let mask = diff::threshold_binary(&gray, params.threshold);

    let contours = contour::external_contours(&mask);
    let hits: Vec<HitPoint> = contours
        .iter()
        .filter(|c| contour::polygon_area(c) > params.min_area)
        .filter_map(|c| contour::bounding_box(c))
        .map(|bbox| {
            let (x, y) = bbox.center();
            HitPoint { x, y }
        })
        .collect();

    debug!(
        contours = contours.len(),
        hits = hits.len(),
        threshold = params.threshold,
        min_area = params.min_area,
        "hit detection"
    );
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rstest::rstest;

    const WIDTH: u32 = 160;
    const HEIGHT: u32 = 120;

    fn scene() -> RgbImage {
        RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            Rgb([(x % 64) as u8 + 40, (y % 32) as u8 + 60, 90])
        })
    }

    fn paint(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn left_edge_blob_is_detected() {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 0, 0, 20, 20, Rgb([255, 255, 255]));
        paint(&mut frame, 0, 60, 20, 20, Rgb([255, 255, 255]));
        paint(&mut frame, 80, 60, 20, 20, Rgb([255, 255, 255]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.contains(&HitPoint { x: 10, y: 10 }));
        assert!(hits.contains(&HitPoint { x: 10, y: 70 }));
        assert!(hits.contains(&HitPoint { x: 90, y: 70 }));
    }

    #[test]
    fn full_frame_difference_is_one_hit() {
        let bg = RgbImage::from_pixel(30, 30, Rgb([0, 0, 0]));
        let frame = RgbImage::from_pixel(30, 30, Rgb([255, 255, 255]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits, vec![HitPoint { x: 15, y: 15 }]);
    }

    #[test]
    fn identical_images_have_no_hits() {
        let bg = scene();
        let hits = detect_hits(&bg, &bg.clone(), &DetectorParams::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn region_below_min_area_is_ignored() {
        let bg = scene();
        let mut frame = bg.clone();
        // 8x8 block encloses 7 * 7 = 49 square pixels.
        paint(&mut frame, 30, 30, 8, 8, Rgb([255, 255, 255]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn blob_center_matches_bounding_box() {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 40, 30, 20, 10, Rgb([255, 255, 255]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits, vec![HitPoint { x: 50, y: 35 }]);
    }

    #[test]
    fn odd_sized_blob_center_rounds_down() {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 11, 21, 13, 9, Rgb([200, 200, 200]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits, vec![HitPoint { x: 11 + 6, y: 21 + 4 }]);
    }

    #[test]
    fn separate_blobs_give_separate_hits() {
        let bg = scene();
        let mut frame = bg.clone();
        paint(&mut frame, 10, 10, 12, 12, Rgb([255, 255, 255]));
        paint(&mut frame, 100, 70, 16, 10, Rgb([0, 0, 0]));
        let mut hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        hits.sort_by_key(|h| (h.x, h.y));
        assert_eq!(hits, vec![HitPoint { x: 16, y: 16 }, HitPoint { x: 108, y: 75 }]);
    }

    #[test]
    fn ring_shaped_blob_counts_once() {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 50, 50, 30, 30, Rgb([255, 255, 255]));
        paint(&mut frame, 55, 55, 20, 20, Rgb([0, 0, 0]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits, vec![HitPoint { x: 65, y: 65 }]);
    }

    #[test]
    fn mismatched_dimensions_are_an_error() {
        let bg = RgbImage::new(WIDTH, HEIGHT);
        let frame = RgbImage::new(WIDTH / 2, HEIGHT / 2);
        let err = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::DimensionMismatch { .. }));
        assert_eq!(err.to_string(), "background is 160x120 but frame is 80x60");
    }

    #[rstest]
    #[case(50, false)]
    #[case(51, true)]
    fn difference_must_exceed_threshold(#[case] level: u8, #[case] expect_hit: bool) {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 20, 20, 20, 20, Rgb([level, level, level]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(!hits.is_empty(), expect_hit);
    }

    #[rstest]
    // (w - 1) * (h - 1) against the default min_area of 50.
    #[case(11, 6, false)] // exactly 50
    #[case(9, 8, true)] // 56
    #[case(8, 8, false)] // 49
    fn area_must_exceed_min_area(#[case] w: u32, #[case] h: u32, #[case] expect_hit: bool) {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 60, 60, w, h, Rgb([255, 255, 255]));
        let hits = detect_hits(&bg, &frame, &DetectorParams::default()).unwrap();
        assert_eq!(hits.len(), usize::from(expect_hit));
    }

    #[test]
    fn custom_params_are_respected() {
        let bg = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([0, 0, 0]));
        let mut frame = bg.clone();
        paint(&mut frame, 20, 20, 5, 5, Rgb([30, 30, 30]));
        let params = DetectorParams {
            threshold: 20,
            min_area: 10.0,
        };
        let hits = detect_hits(&bg, &frame, &params).unwrap();
        assert_eq!(hits, vec![HitPoint { x: 22, y: 22 }]);
    }
}
