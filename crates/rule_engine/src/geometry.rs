//! ROI geometry in pixel space.
//!
//! Configuration coordinates are normalized (0..1). [`PixelRoi`] converts them
//! once, using the dimensions of the first observed frame, and every rule then
//! works on pixels.

use contracts::{LineSegment, Point, RoiConfig};
use nalgebra::Vector2;

/// Calibration points closer than this (pixels) give no usable ratio
const MIN_CALIB_PIXELS: f64 = 1e-3;

/// Direction vectors shorter than this are treated as undefined
pub(crate) const MIN_DIRECTION_NORM: f64 = 1e-6;

const ON_EDGE_EPS: f64 = 1e-9;

#[inline]
pub(crate) fn to_vector(p: Point) -> Vector2<f64> {
    Vector2::new(p.x, p.y)
}

/// Unit vector along `v`, `None` when `v` is (nearly) zero
pub fn unit(v: Vector2<f64>) -> Option<Vector2<f64>> {
    let norm = v.norm();
    (norm > MIN_DIRECTION_NORM).then(|| v / norm)
}

/// Point-in-polygon test, boundary counts as inside
///
/// Polygons with fewer than three vertices contain nothing.
pub fn point_in_zone(point: Point, zone: &[Point]) -> bool {
    if zone.len() < 3 {
        return false;
    }

    let edges = zone.iter().zip(zone.iter().cycle().skip(1));

    let mut inside = false;
    for (a, b) in edges {
        if distance_to_segment(point, &LineSegment::new(*a, *b)) <= ON_EDGE_EPS {
            return true;
        }
        // even-odd ray cast towards +x
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Distance from `point` to the closest point of the segment
///
/// The perpendicular projection is clamped to the segment's endpoints.
pub fn distance_to_segment(point: Point, line: &LineSegment) -> f64 {
    let a = to_vector(line.a);
    let ab = to_vector(line.b) - a;
    let ap = to_vector(point) - a;

    let len_sq = ab.norm_squared();
    if len_sq <= f64::EPSILON {
        return ap.norm();
    }

    let t = (ap.dot(&ab) / len_sq).clamp(0.0, 1.0);
    (ap - ab * t).norm()
}

/// Whether the point lies within `tolerance` pixels of the segment (inclusive)
pub fn line_crossed(point: Point, line: &LineSegment, tolerance: f64) -> bool {
    distance_to_segment(point, line) <= tolerance
}

/// Meters per pixel from two pixel calibration points and their real distance
///
/// `None` when the points coincide (within 1e-3 px), which disables the
/// speed rule.
pub fn meters_per_pixel(calib: &LineSegment, distance_m: f64) -> Option<f64> {
    let pixels = calib.length();
    (pixels > MIN_CALIB_PIXELS).then(|| distance_m / pixels)
}

/// Real-world speed in km/h
pub fn speed_kmh(pixels: f64, meters_per_pixel: f64, dt_s: f64) -> f64 {
    pixels * meters_per_pixel / dt_s * 3.6
}

/// ROI converted to pixel space for one session
#[derive(Debug, Clone)]
pub struct PixelRoi {
    /// Lane polygons, configuration order
    pub lanes: Vec<Vec<Point>>,
    pub stop_line: Option<LineSegment>,
    /// Configured unit direction per lane (positional, `None` if missing or degenerate)
    pub directions: Vec<Option<Vector2<f64>>>,
    pub meters_per_pixel: Option<f64>,
    pub speed_limit_kmh: Option<f64>,
    /// Frame size the conversion used
    pub frame_size: (u32, u32),
}

impl PixelRoi {
    pub fn from_config(config: &RoiConfig, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));

        let lanes = config
            .lanes
            .iter()
            .map(|lane| lane.iter().map(|p| p.scaled(w, h)).collect())
            .collect();

        let directions = config
            .lane_directions
            .iter()
            .map(|d| {
                let d = d.scaled(w, h);
                unit(to_vector(d.b) - to_vector(d.a))
            })
            .collect();

        let meters_per_pixel = match (config.speed_calib_points, config.speed_calib_distance_m) {
            (Some(points), Some(distance)) => meters_per_pixel(&points.scaled(w, h), distance),
            _ => None,
        };

        Self {
            lanes,
            stop_line: config.stop_line.map(|l| l.scaled(w, h)),
            directions,
            meters_per_pixel,
            speed_limit_kmh: config.speed_limit_kmh,
            frame_size: (width, height),
        }
    }

    /// Index of the first lane (configuration order) containing the point
    pub fn lane_of(&self, point: Point) -> Option<usize> {
        self.lanes.iter().position(|lane| point_in_zone(point, lane))
    }

    pub fn has_lanes(&self) -> bool {
        !self.lanes.is_empty()
    }

    /// Calibration ratio and limit, only when both are usable
    pub fn speed_rule(&self) -> Option<(f64, f64)> {
        self.meters_per_pixel.zip(self.speed_limit_kmh)
    }
}
