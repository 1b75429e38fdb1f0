//! Processing metrics snapshot exposed to viewers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Derived metrics, recomputed on demand from rolling windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// `1 / mean(frame duration)`, 0 when no frame was processed
    pub fps: f64,
    /// Mean frame processing time (ms)
    pub avg_process_time_ms: f64,
    /// Mean detections per frame
    pub avg_detections: f64,
    /// Cumulative alerts per kind since session start
    pub violations: BTreeMap<String, u64>,
    /// Seconds since session start
    pub uptime_seconds: f64,
}
