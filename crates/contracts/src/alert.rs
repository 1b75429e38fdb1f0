//! Alert - Rule engine / lifecycle 输出
//!
//! Violation kinds, raw violation events, emitted alerts and the signal state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::BBox;

/// Free-form structured alert details (`speed_kmh`, `lane`, `text`, ...)
pub type AlertInfo = serde_json::Map<String, serde_json::Value>;

/// Violation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Crossed the stop line on red
    SignalCrossing,
    /// Left all configured lanes
    LaneExit,
    /// Sustained motion against the lane direction
    WrongWay,
    /// Calibrated speed above the limit
    Speeding,
    /// Rider without a helmet
    NoHelmet,
    /// Informational plate read
    PlateRead,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 6] = [
        ViolationKind::SignalCrossing,
        ViolationKind::LaneExit,
        ViolationKind::WrongWay,
        ViolationKind::Speeding,
        ViolationKind::NoHelmet,
        ViolationKind::PlateRead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::SignalCrossing => "signal_crossing",
            ViolationKind::LaneExit => "lane_exit",
            ViolationKind::WrongWay => "wrong_way",
            ViolationKind::Speeding => "speeding",
            ViolationKind::NoHelmet => "no_helmet",
            ViolationKind::PlateRead => "plate_read",
        }
    }

    /// Informational kinds carry no evidence and no highlight
    pub fn is_informational(self) -> bool {
        matches!(self, ViolationKind::PlateRead)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw violation produced by the rule evaluator, before debouncing
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub track_id: Option<u64>,
    pub info: AlertInfo,
    /// Box used for evidence capture
    pub bbox: Option<BBox>,
    pub vehicle_class: Option<String>,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, track_id: Option<u64>) -> Self {
        Self {
            kind,
            track_id,
            info: AlertInfo::new(),
            bbox: None,
            vehicle_class: None,
        }
    }

    pub fn with_info(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.info.insert(key.to_string(), value.into());
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_vehicle_class(mut self, class_name: impl Into<String>) -> Self {
        self.vehicle_class = Some(class_name.into());
        self
    }
}

/// Emitted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Emission time (session clock, seconds)
    pub ts: f64,
    /// Violation kind
    pub kind: ViolationKind,
    /// Track ID (None for untracked objects)
    pub track_id: Option<u64>,
    /// Kind-specific details
    #[serde(default)]
    pub info: AlertInfo,
    /// Vehicle class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_class: Option<String>,
    /// Evidence reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<String>,
}

/// Externally controlled signal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Red,
    #[default]
    Green,
}

impl SignalState {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalState::Red => "red",
            SignalState::Green => "green",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized signal value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized signal state '{0}'")]
pub struct UnknownSignal(pub String);

impl FromStr for SignalState {
    type Err = UnknownSignal;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(SignalState::Red),
            "green" => Ok(SignalState::Green),
            _ => Err(UnknownSignal(s.to_string())),
        }
    }
}

/// Snapshot returned to viewers: signal state plus alerts, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertFeed {
    pub signal: SignalState,
    pub alerts: Vec<Alert>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_parse_normalizes() {
        assert_eq!(" RED ".parse::<SignalState>(), Ok(SignalState::Red));
        assert_eq!("Green".parse::<SignalState>(), Ok(SignalState::Green));
        assert!("amber".parse::<SignalState>().is_err());
        assert!("".parse::<SignalState>().is_err());
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in ViolationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!(ViolationKind::PlateRead.is_informational());
        assert!(!ViolationKind::WrongWay.is_informational());
    }

    #[test]
    fn test_event_builder() {
        let event = ViolationEvent::new(ViolationKind::Speeding, Some(7))
            .with_info("speed_kmh", 36.0)
            .with_vehicle_class("car")
            .with_bbox(BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(event.info["speed_kmh"], serde_json::json!(36.0));
        assert_eq!(event.vehicle_class.as_deref(), Some("car"));
        assert!(event.bbox.is_some());
    }
}
