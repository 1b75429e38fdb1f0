//! Rule engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

/// Vehicle classes used for direction learning and plate reading
pub const DEFAULT_VEHICLE_CLASSES: [&str; 5] = ["car", "bus", "truck", "motorcycle", "bicycle"];

/// Rule engine and alert lifecycle tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEngineConfig {
    /// Minimum seconds between alerts for one (track, kind) key
    #[serde(default = "default_window_s")]
    pub cooldown_s: f64,

    /// Seconds a violating track stays highlighted
    #[serde(default = "default_window_s")]
    pub highlight_s: f64,

    /// Seconds a wrong-way track keeps the focus
    #[serde(default = "default_window_s")]
    pub focus_s: f64,

    /// Stop line crossing tolerance (pixels)
    #[serde(default = "default_line_tolerance_px")]
    pub line_tolerance_px: f64,

    /// Classes treated as vehicles
    #[serde(default = "default_vehicle_classes")]
    pub vehicle_classes: Vec<String>,

    /// Per-track state idle longer than this is evicted (seconds)
    #[serde(default = "default_track_idle_timeout_s")]
    pub track_idle_timeout_s: f64,

    /// Alert log capacity
    #[serde(default = "default_alert_log_capacity")]
    pub alert_log_capacity: usize,

    /// Wrong-way detection
    #[serde(default)]
    pub wrong_way: WrongWayConfig,

    /// Lane direction learning
    #[serde(default)]
    pub learning: LearningConfig,

    /// Calibrated speed rule
    #[serde(default)]
    pub speed: SpeedConfig,

    /// Optional classifier cadence
    #[serde(default)]
    pub classifiers: ClassifierCadence,
}

fn default_window_s() -> f64 {
    5.0
}

fn default_line_tolerance_px() -> f64 {
    5.0
}

fn default_vehicle_classes() -> Vec<String> {
    DEFAULT_VEHICLE_CLASSES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_track_idle_timeout_s() -> f64 {
    30.0
}

fn default_alert_log_capacity() -> usize {
    200
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            cooldown_s: default_window_s(),
            highlight_s: default_window_s(),
            focus_s: default_window_s(),
            line_tolerance_px: default_line_tolerance_px(),
            wrong_way: WrongWayConfig::default(),
            learning: LearningConfig::default(),
            speed: SpeedConfig::default(),
            classifiers: ClassifierCadence::default(),
            vehicle_classes: default_vehicle_classes(),
            track_idle_timeout_s: default_track_idle_timeout_s(),
            alert_log_capacity: default_alert_log_capacity(),
        }
    }
}

impl RuleEngineConfig {
    pub fn is_vehicle(&self, class_name: &str) -> bool {
        self.vehicle_classes.iter().any(|c| c == class_name)
    }
}

/// Wrong-way detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrongWayConfig {
    /// Consecutive opposing frames before an alert
    pub threshold_frames: u32,
    /// Speed floor (px/s)
    pub min_speed_pxps: f64,
    /// Motion history capacity per track
    pub history_capacity: usize,
    /// Samples required before a velocity is computed
    pub min_history: usize,
    /// Minimum time span covered by the history (seconds)
    pub min_span_s: f64,
    /// Motion opposes the lane when `dot < -opposite_factor * speed`
    pub opposite_factor: f64,
}

impl Default for WrongWayConfig {
    fn default() -> Self {
        Self {
            threshold_frames: 10,
            min_speed_pxps: 30.0,
            history_capacity: 12,
            min_history: 4,
            min_span_s: 0.1,
            opposite_factor: 0.5,
        }
    }
}

/// Lane direction learning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Sample pool capacity per lane
    pub sample_capacity: usize,
    /// Samples required before a lane direction is computed
    pub min_samples: usize,
    /// Recompute every N frames
    pub update_interval_frames: u64,
    /// Speed floor for a qualifying sample (px/s)
    pub min_speed_pxps: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 600,
            min_samples: 20,
            update_interval_frames: 60,
            min_speed_pxps: 30.0,
        }
    }
}

/// Calibrated speed rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Minimum elapsed time between positions (seconds)
    pub min_dt_s: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self { min_dt_s: 0.05 }
    }
}

/// Frame cadence of the optional classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierCadence {
    /// Helmet check every N frames
    pub helmet_every: u64,
    /// Plate read every N frames
    pub plate_every: u64,
    /// Fraction of the rider box examined for a helmet
    pub head_fraction: f64,
}

impl Default for ClassifierCadence {
    fn default() -> Self {
        Self {
            helmet_every: 5,
            plate_every: 7,
            head_fraction: 0.4,
        }
    }
}
