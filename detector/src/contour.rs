//! Outer-border extraction over a binary mask.
//!
//! Borders come from `imageproc`'s Suzuki-Abe border following. Only borders
//! without a parent are kept, i.e. the outline of each connected foreground
//! region; holes and anything nested inside them are ignored.
//!
//! The mask is traced inside a one-pixel zero frame. Without it, regions that
//! touch the left edge come back as parentless holes.

use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Axis-aligned box covering every point of a contour, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Integer center of the box (`x + w / 2`, `y + h / 2`).
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Outer borders of every foreground region in discovery order, each
/// compressed with [`simplify_chain`].
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let padded = pad_with_zeros(binary);
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point<i32>> =
                c.points.iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect();
            simplify_chain(&points)
        })
        .collect()
}

fn pad_with_zeros(binary: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut padded, binary, 1, 1);
    padded
}

/// Drop every point that continues the previous step in the same direction,
/// so straight horizontal, vertical and diagonal runs keep only their ends.
/// The contour is treated as closed.
pub fn simplify_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| ((to.x - from.x).signum(), (to.y - from.y).signum());

    let kept: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| points[i])
        .collect();

    if kept.is_empty() {
        points[..1].to_vec()
    } else {
        kept
    }
}

/// Area enclosed by the closed polygon through `points` (shoelace formula).
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with_rect(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x >= x0 && x < x0 + w && y >= y0 && y < y0 + h {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn filled_rect_simplifies_to_corners() {
        let mask = mask_with_rect(20, 20, 3, 4, 6, 5);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let corners = &contours[0];
        assert_eq!(corners.len(), 4);
        for corner in [
            Point::new(3, 4),
            Point::new(8, 4),
            Point::new(8, 8),
            Point::new(3, 8),
        ] {
            assert!(corners.contains(&corner), "missing corner {corner:?}");
        }
    }

    #[test]
    fn filled_rect_area_and_box() {
        let mask = mask_with_rect(20, 20, 3, 4, 6, 5);
        let contour = &external_contours(&mask)[0];
        // Border runs through pixel centers: (w - 1) * (h - 1).
        assert_eq!(polygon_area(contour), 20.0);
        assert_eq!(
            bounding_box(contour),
            Some(BoundingBox { x: 3, y: 4, width: 6, height: 5 })
        );
    }

    #[test]
    fn hole_is_not_reported() {
        let mut mask = mask_with_rect(30, 30, 5, 5, 15, 15);
        for y in 9..15 {
            for x in 9..15 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(external_contours(&mask).len(), 1);
    }

    #[test]
    fn region_inside_hole_is_not_external() {
        let mut mask = mask_with_rect(40, 40, 5, 5, 25, 25);
        for y in 9..26 {
            for x in 9..26 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 15..19 {
            for x in 15..19 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        assert_eq!(external_contours(&mask).len(), 1);
    }

    #[test]
    fn regions_on_every_edge_are_outer_borders() {
        for (x0, y0) in [(0, 0), (0, 7), (7, 0), (12, 7), (7, 12), (12, 12)] {
            let mask = mask_with_rect(20, 20, x0, y0, 8, 8);
            let contours = external_contours(&mask);
            assert_eq!(contours.len(), 1, "rect at ({x0}, {y0})");
            assert_eq!(polygon_area(&contours[0]), 49.0);
            assert_eq!(
                bounding_box(&contours[0]),
                Some(BoundingBox { x: x0 as i32, y: y0 as i32, width: 8, height: 8 })
            );
        }
    }

    #[test]
    fn full_mask_is_one_region() {
        let mask = mask_with_rect(10, 6, 0, 0, 10, 6);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            bounding_box(&contours[0]),
            Some(BoundingBox { x: 0, y: 0, width: 10, height: 6 })
        );
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(external_contours(&GrayImage::new(16, 16)).is_empty());
    }

    #[test]
    fn single_pixel_has_zero_area() {
        let mask = mask_with_rect(8, 8, 2, 2, 1, 1);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(polygon_area(&contours[0]), 0.0);
        assert_eq!(
            bounding_box(&contours[0]),
            Some(BoundingBox { x: 2, y: 2, width: 1, height: 1 })
        );
    }

    #[test]
    fn collinear_points_are_dropped() {
        let line: Vec<Point<i32>> = vec![
            Point::new(0, 0),
            Point::new(1, 0),
            Point::new(2, 0),
            Point::new(2, 1),
            Point::new(2, 2),
            Point::new(1, 1),
        ];
        let simplified = simplify_chain(&line);
        assert_eq!(
            simplified,
            vec![Point::new(0, 0), Point::new(2, 0), Point::new(2, 2)]
        );
    }

    #[test]
    fn center_uses_integer_halves() {
        let bbox = BoundingBox { x: 10, y: 20, width: 5, height: 4 };
        assert_eq!(bbox.center(), (12, 22));
    }
}
