//! Geometry primitives shared by configuration, detections and alerts.
//!
//! Coordinates are either normalized (0..1, configuration) or pixels
//! (detections, evaluated ROI). The types do not carry the unit; the
//! owning structure documents it.

use serde::{Deserialize, Serialize};

/// 2D point, serialized as `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale a normalized point to pixel space
    pub fn scaled(self, width: f64, height: f64) -> Self {
        Self::new(self.x * width, self.y * height)
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Axis-aligned bounding box in pixels, `(x1, y1)` top-left, `(x2, y2)` bottom-right
///
/// Serialized as `[x1, y1, x2, y2]`, the layout detectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box center
    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Upper `fraction` of the box (head region for riders)
    pub fn top_fraction(&self, fraction: f64) -> BBox {
        let fraction = fraction.clamp(0.0, 1.0);
        BBox::new(
            self.x1,
            self.y1,
            self.x2,
            self.y1 + self.height() * fraction,
        )
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Directed line segment `a -> b`, serialized as `[[ax, ay], [bx, by]]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Point; 2]", into = "[Point; 2]")]
pub struct LineSegment {
    pub a: Point,
    pub b: Point,
}

impl LineSegment {
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    /// Scale a normalized segment to pixel space
    pub fn scaled(self, width: f64, height: f64) -> Self {
        Self::new(self.a.scaled(width, height), self.b.scaled(width, height))
    }
}

impl From<[Point; 2]> for LineSegment {
    fn from([a, b]: [Point; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<LineSegment> for [Point; 2] {
    fn from(l: LineSegment) -> Self {
        [l.a, l.b]
    }
}
