//! Point-in-shape predicates.
//!
//! Every test is boundary-inclusive and works on the same coordinates the
//! renderer draws with: `x`/`y` of a shape is the top-left corner of its
//! bounding box.

use crate::shape::{Geometry, Shape};

/// Vertices of the isosceles triangle inscribed in a `size`×`size` box:
/// bottom-left, bottom-right, apex at top-centre.
pub fn triangle_vertices(x: f64, y: f64, size: f64) -> [(f64, f64); 3] {
    [(x, y + size), (x + size, y + size), (x + size / 2.0, y)]
}

/// Does the point `(px, py)` lie inside `shape`?
pub fn contains(shape: &Shape, px: f64, py: f64) -> bool {
    let x0 = f64::from(shape.x);
    let y0 = f64::from(shape.y);

    match shape.geometry {
        Geometry::Square { size } => in_box(x0, y0, f64::from(size), f64::from(size), px, py),
        Geometry::Rectangle { width, height } => {
            in_box(x0, y0, f64::from(width), f64::from(height), px, py)
        }
        Geometry::Circle { radius } => {
            let r = f64::from(radius);
            let dx = px - (x0 + r);
            let dy = py - (y0 + r);
            dx * dx + dy * dy <= r * r
        }
        Geometry::Ellipse { rx, ry } => {
            let (rx, ry) = (f64::from(rx), f64::from(ry));
            let dx = px - (x0 + rx);
            let dy = py - (y0 + ry);
            // A zero radius yields inf/NaN here, which compares false.
            (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry) <= 1.0
        }
        Geometry::Triangle { size } => in_triangle(x0, y0, f64::from(size), px, py),
    }
}

fn in_box(x0: f64, y0: f64, w: f64, h: f64, px: f64, py: f64) -> bool {
    x0 <= px && px <= x0 + w && y0 <= py && py <= y0 + h
}

fn in_triangle(x0: f64, y0: f64, size: f64, px: f64, py: f64) -> bool {
    let [(x1, y1), (x2, y2), (x3, y3)] = triangle_vertices(x0, y0, size);

    let denom = (y2 - y3) * (x1 - x3) + (x3 - x2) * (y1 - y3);
    if denom == 0.0 {
        return false;
    }

    let a = ((y2 - y3) * (px - x3) + (x3 - x2) * (py - y3)) / denom;
    let b = ((y3 - y1) * (px - x3) + (x1 - x3) * (py - y3)) / denom;
    let c = 1.0 - a - b;

    let unit = 0.0..=1.0;
    unit.contains(&a) && unit.contains(&b) && unit.contains(&c)
}

/// First shape, in list order, that contains the point.
pub fn hit_test(shapes: &[Shape], px: f64, py: f64) -> Option<&Shape> {
    shapes.iter().find(|shape| contains(shape, px, py))
}

/// Size of the drawable surface in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

pub const START_BUTTON_WIDTH: f64 = 200.0;
pub const START_BUTTON_HEIGHT: f64 = 80.0;

impl Surface {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width over height; 1 for a surface that has no size yet.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// The start button, centred on the surface.
    pub fn start_region(&self) -> Region {
        let cx = self.width / 2.0;
        let cy = self.height / 2.0;
        Region {
            x1: cx - START_BUTTON_WIDTH / 2.0,
            y1: cy - START_BUTTON_HEIGHT / 2.0,
            x2: cx + START_BUTTON_WIDTH / 2.0,
            y2: cy + START_BUTTON_HEIGHT / 2.0,
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Axis-aligned rectangle, edges included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Region {
    pub fn contains(&self, px: f64, py: f64) -> bool {
        self.x1 <= px && px <= self.x2 && self.y1 <= py && py <= self.y2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ShapeKind, ShapeRecord};

    fn shape(kind: ShapeKind, x: i32, y: i32, edit: impl FnOnce(&mut ShapeRecord)) -> Shape {
        let mut record = ShapeRecord::new(kind, "s", x, y);
        edit(&mut record);
        Shape::from_record(&record).unwrap()
    }

    #[test]
    fn test_square_is_boundary_inclusive() {
        let sq = shape(ShapeKind::Square, 10, 10, |r| r.size = Some(20));

        assert!(contains(&sq, 10.0, 10.0));
        assert!(contains(&sq, 30.0, 30.0));
        assert!(contains(&sq, 20.0, 20.0));
        assert!(!contains(&sq, 31.0, 10.0));
        assert!(!contains(&sq, 10.0, 31.0));
    }

    #[test]
    fn test_rectangle_uses_both_extents() {
        let rect = shape(ShapeKind::Rectangle, 0, 0, |r| {
            r.width = Some(50);
            r.height = Some(10);
        });

        assert!(contains(&rect, 50.0, 10.0));
        assert!(!contains(&rect, 50.0, 11.0));
        assert!(!contains(&rect, -0.5, 5.0));
    }

    #[test]
    fn test_circle_center_is_derived_from_bounding_box() {
        let circle = shape(ShapeKind::Circle, 0, 0, |r| r.radius = Some(10));

        assert!(contains(&circle, 10.0, 20.0));
        assert!(!contains(&circle, 10.0, 21.0));
        // corner of the bounding box is outside the circle
        assert!(!contains(&circle, 0.0, 0.0));
    }

    #[test]
    fn test_ellipse_normalized_form() {
        let ellipse = shape(ShapeKind::Ellipse, 0, 0, |r| {
            r.rx = Some(20);
            r.ry = Some(10);
        });

        assert!(contains(&ellipse, 40.0, 10.0));
        assert!(contains(&ellipse, 20.0, 0.0));
        assert!(!contains(&ellipse, 20.0, 21.0));
        assert!(!contains(&ellipse, 41.0, 10.0));
    }

    #[test]
    fn test_degenerate_ellipse_contains_nothing() {
        let ellipse = shape(ShapeKind::Ellipse, 5, 5, |r| {
            r.rx = Some(0);
            r.ry = Some(0);
        });

        assert!(!contains(&ellipse, 5.0, 5.0));
    }

    #[test]
    fn test_triangle_apex_and_base() {
        let tri = shape(ShapeKind::Triangle, 0, 0, |r| r.size = Some(100));

        assert!(contains(&tri, 50.0, 0.0));
        assert!(contains(&tri, 0.0, 100.0));
        assert!(contains(&tri, 100.0, 100.0));
        assert!(contains(&tri, 50.0, 50.0));
        // top corners of the bounding box lie outside the triangle
        assert!(!contains(&tri, 0.0, 0.0));
        assert!(!contains(&tri, 100.0, 0.0));
        assert!(!contains(&tri, 50.0, 101.0));
    }

    #[test]
    fn test_degenerate_triangle_contains_nothing() {
        let tri = shape(ShapeKind::Triangle, 10, 10, |r| r.size = Some(0));

        for (px, py) in [(10.0, 10.0), (0.0, 0.0), (10.5, 10.0), (-3.0, 7.0)] {
            assert!(!contains(&tri, px, py));
        }
    }

    #[test]
    fn test_hit_test_returns_first_in_order() {
        let mut a = shape(ShapeKind::Square, 0, 0, |r| r.size = Some(50));
        a.id = "a".into();
        let mut b = shape(ShapeKind::Square, 25, 25, |r| r.size = Some(50));
        b.id = "b".into();
        let shapes = vec![a, b];

        assert_eq!(hit_test(&shapes, 30.0, 30.0).map(|s| s.id.as_str()), Some("a"));
        assert_eq!(hit_test(&shapes, 70.0, 70.0).map(|s| s.id.as_str()), Some("b"));
        assert!(hit_test(&shapes, 90.0, 10.0).is_none());
    }

    #[test]
    fn test_start_region_is_centred() {
        let region = Surface::new(800.0, 600.0).start_region();
        assert_eq!(
            region,
            Region {
                x1: 300.0,
                y1: 260.0,
                x2: 500.0,
                y2: 340.0
            }
        );
        assert!(region.contains(300.0, 340.0));
        assert!(!region.contains(299.9, 300.0));
    }

    #[test]
    fn test_aspect_ratio_of_empty_surface_is_one() {
        assert_eq!(Surface::new(0.0, 0.0).aspect_ratio(), 1.0);
        assert_eq!(Surface::new(800.0, 400.0).aspect_ratio(), 2.0);
    }
}
