use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::{DetectError, HitPoint};

const LABEL_OFFSET_X: i32 = 14;

/// 3x5 digit glyphs, one row per byte, bit 2 = left column.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// How hit markers are drawn onto a screenshot.
pub struct AnnotationStyle {
    pub marker_radius: i32,
    pub marker_color: Rgb<u8>,
    pub label_color: Rgb<u8>,
    /// Label height in pixels.
    pub label_scale: f32,
    font: Option<FontVec>,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            marker_radius: 12,
            marker_color: Rgb([255, 0, 0]),
            label_color: Rgb([255, 255, 255]),
            label_scale: 21.0,
            font: None,
        }
    }
}

impl AnnotationStyle {
    pub fn new(marker_radius: i32, label_scale: f32) -> Self {
        Self {
            marker_radius,
            label_scale,
            ..Self::default()
        }
    }

    /// Render labels with the font at `path` instead of the built-in digits.
    pub fn with_font_file(mut self, path: &Path) -> Result<Self, DetectError> {
        let data = std::fs::read(path)
            .map_err(|e| DetectError::Font(format!("{}: {e}", path.display())))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| DetectError::Font(format!("{}: {e}", path.display())))?;
        debug!(path = path.display().to_string(), "loaded label font");
        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

/// Draw a ring and a 1-based index label for each hit, in list order.
pub fn annotate_hits(img: &mut RgbImage, hits: &[HitPoint], style: &AnnotationStyle) {
    for (idx, hit) in hits.iter().enumerate() {
        let center = (hit.x, hit.y);
        // Two concentric rings give a 2px stroke.
        draw_hollow_circle_mut(img, center, style.marker_radius, style.marker_color);
        draw_hollow_circle_mut(img, center, style.marker_radius + 1, style.marker_color);

        let label = (idx + 1).to_string();
        let origin = (hit.x + LABEL_OFFSET_X, hit.y);
        match &style.font {
            Some(font) => draw_font_label(img, origin, &label, font, style),
            None => draw_block_label(img, origin, &label, style),
        }
    }
}

/// `origin` is the bottom-left of the text, like a baseline.
fn draw_font_label(
    img: &mut RgbImage,
    origin: (i32, i32),
    text: &str,
    font: &FontVec,
    style: &AnnotationStyle,
) {
    let scale = PxScale::from(style.label_scale);
    let ascent = font.as_scaled(scale).ascent().round() as i32;
    let top = origin.1 - ascent;
    // Overdraw one pixel right for a heavier stroke.
    draw_text_mut(img, style.label_color, origin.0, top, scale, font, text);
    draw_text_mut(img, style.label_color, origin.0 + 1, top, scale, font, text);
}

fn draw_block_label(img: &mut RgbImage, origin: (i32, i32), text: &str, style: &AnnotationStyle) {
    let cell = block_cell_size(style.label_scale);
    let top = origin.1 - 5 * cell;
    let mut left = origin.0;

    for digit in text.chars().filter_map(|c| c.to_digit(10)) {
        let glyph = &DIGITS[digit as usize];
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    let rect = Rect::at(left + col * cell, top + row as i32 * cell)
                        .of_size(cell as u32, cell as u32);
                    draw_filled_rect_mut(img, rect, style.label_color);
                }
            }
        }
        left += 4 * cell;
    }
}

/// Pixel size of one glyph cell so that five rows roughly span the label scale.
fn block_cell_size(label_scale: f32) -> i32 {
    ((label_scale / 7.0).round() as i32).max(1)
}
