//! Region-of-interest configuration (normalized coordinates).

use serde::{Deserialize, Serialize};

use crate::{LineSegment, Point};

/// Detector classes admitted to rule evaluation when none are configured
pub const DEFAULT_CLASSES: [&str; 6] = ["person", "car", "motorcycle", "bus", "truck", "bicycle"];

/// Per-session ROI definition
///
/// All coordinates are normalized to `0..=1` of the frame size and are
/// converted to pixels exactly once, against the first observed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiConfig {
    /// Lane polygons, in priority order
    #[serde(default)]
    pub lanes: Vec<Vec<Point>>,

    /// Signal-controlled stop line
    #[serde(default)]
    pub stop_line: Option<LineSegment>,

    /// Detector classes admitted to rule evaluation
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,

    /// Fixed travel direction per lane (`from -> to`), consumed positionally
    #[serde(default)]
    pub lane_directions: Vec<LineSegment>,

    /// Learn lane directions from traffic when none are configured
    #[serde(default)]
    pub auto_lane_direction: bool,

    /// Frames to observe before the first learned direction is published
    #[serde(default = "default_warmup_frames")]
    pub auto_lane_warmup_frames: u64,

    /// Two reference points with a known real-world distance between them
    #[serde(default)]
    pub speed_calib_points: Option<LineSegment>,

    /// Real-world distance between the calibration points (meters)
    #[serde(default)]
    pub speed_calib_distance_m: Option<f64>,

    /// Speed limit (km/h)
    #[serde(default)]
    pub speed_limit_kmh: Option<f64>,

    /// Model locator for the optional helmet classifier
    #[serde(default)]
    pub helmet_model_path: Option<String>,

    /// Model locator for the optional plate reader
    #[serde(default)]
    pub plate_model_path: Option<String>,
}

fn default_classes() -> Vec<String> {
    DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect()
}

fn default_warmup_frames() -> u64 {
    180
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            lanes: Vec::new(),
            stop_line: None,
            classes: default_classes(),
            lane_directions: Vec::new(),
            auto_lane_direction: false,
            auto_lane_warmup_frames: default_warmup_frames(),
            speed_calib_points: None,
            speed_calib_distance_m: None,
            speed_limit_kmh: None,
            helmet_model_path: None,
            plate_model_path: None,
        }
    }
}

impl RoiConfig {
    /// Whether lane directions are learned from traffic
    ///
    /// Explicit directions always win over learning.
    pub fn learns_directions(&self) -> bool {
        self.auto_lane_direction && self.lane_directions.is_empty()
    }

    /// Calibration and limit are both present
    pub fn speed_rule_configured(&self) -> bool {
        self.speed_calib_points.is_some()
            && self.speed_calib_distance_m.is_some()
            && self.speed_limit_kmh.is_some()
    }
}
