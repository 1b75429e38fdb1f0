//! JSONL 场景回放
//!
//! 每行一帧：
//!
//! ```json
//! {"timestamp": 0.033, "width": 1280, "height": 720,
//!  "objects": [{"bbox": [10, 20, 110, 220], "track_id": 3, "class_name": "car"}],
//!  "signal": "red"}
//! ```
//!
//! 同一文件拆分为 [`ReplaySource`] (帧) 与 [`ReplayTracker`] (检测结果)。
//! 回放帧像素全黑，规则只依赖几何。

use std::fs;
use std::path::Path;

use bytes::Bytes;
use contracts::{
    ContractError, DetectorTracker, Frame, FrameSource, ImageData, SignalState, TrackedObject,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// 信号灯回调：回放行带 `signal` 字段时调用
pub type SignalHook = Box<dyn FnMut(SignalState) + Send>;

/// 回放文件中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// 时间戳 (秒)
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub objects: Vec<TrackedObject>,
    /// "red" / "green"，可选
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// 已加载的回放场景
#[derive(Debug, Clone)]
pub struct ReplayLog {
    source_id: String,
    records: Vec<ReplayRecord>,
}

impl ReplayLog {
    /// 加载 JSONL 文件 (空行忽略)
    #[instrument(name = "replay_load", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| IngestionError::open(path.display().to_string(), e.to_string()))?;
        let log = Self::parse(path.display().to_string(), &content)?;
        info!(
            source = %log.source_id,
            frames = log.len(),
            "Replay loaded"
        );
        Ok(log)
    }

    /// 解析 JSONL 文本
    pub fn parse(source_id: impl Into<String>, content: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayRecord = serde_json::from_str(line)
                .map_err(|e| IngestionError::parse_failed(line_no, e.to_string()))?;
            validate_record(&record, line_no)?;
            records.push(record);
        }
        Ok(Self::from_records(source_id, records))
    }

    pub fn from_records(source_id: impl Into<String>, records: Vec<ReplayRecord>) -> Self {
        Self {
            source_id: source_id.into(),
            records,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 由时间戳推算的帧率 (少于两帧或时间不前进时为 None)
    pub fn nominal_fps(&self) -> Option<f64> {
        let first = self.records.first()?.timestamp;
        let last = self.records.last()?.timestamp;
        let span = last - first;
        (self.records.len() > 1 && span > 0.0).then(|| (self.records.len() - 1) as f64 / span)
    }

    /// 序列化为 JSONL
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for (idx, record) in self.records.iter().enumerate() {
            let line = serde_json::to_string(record)
                .map_err(|e| IngestionError::parse_failed(idx + 1, e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// 拆分为帧源与检测器
    pub fn split(self) -> (ReplaySource, ReplayTracker) {
        let nominal_fps = self.nominal_fps();
        let mut frames = Vec::with_capacity(self.records.len());
        let mut objects = Vec::with_capacity(self.records.len());
        for record in self.records {
            frames.push(FrameMeta {
                timestamp: record.timestamp,
                width: record.width,
                height: record.height,
                signal: record.signal,
            });
            objects.push(record.objects);
        }

        let source = ReplaySource {
            source_id: self.source_id,
            nominal_fps,
            frames,
            cursor: 0,
            released: false,
            blank: None,
            signal_hook: None,
        };
        (source, ReplayTracker { objects })
    }
}

fn validate_record(record: &ReplayRecord, line: usize) -> Result<()> {
    if record.width == 0 || record.height == 0 {
        return Err(IngestionError::invalid_frame(line, "width and height must be > 0"));
    }
    if !record.timestamp.is_finite() {
        return Err(IngestionError::invalid_frame(line, "timestamp must be finite"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct FrameMeta {
    timestamp: f64,
    width: u32,
    height: u32,
    signal: Option<String>,
}

/// 回放帧源
pub struct ReplaySource {
    source_id: String,
    nominal_fps: Option<f64>,
    frames: Vec<FrameMeta>,
    cursor: usize,
    released: bool,
    /// 最近一次尺寸的黑帧缓存
    blank: Option<(u32, u32, Bytes)>,
    signal_hook: Option<SignalHook>,
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("source_id", &self.source_id)
            .field("frames", &self.frames.len())
            .field("cursor", &self.cursor)
            .field("released", &self.released)
            .finish()
    }
}

impl ReplaySource {
    /// 注册信号灯回调
    pub fn with_signal_hook(mut self, hook: impl FnMut(SignalState) + Send + 'static) -> Self {
        self.signal_hook = Some(Box::new(hook));
        self
    }

    /// 剩余帧数
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn blank_image(&mut self, width: u32, height: u32) -> ImageData {
        match &self.blank {
            Some((w, h, data)) if *w == width && *h == height => ImageData {
                width,
                height,
                format: contracts::ImageFormat::Rgb8,
                data: data.clone(),
            },
            _ => {
                let image = ImageData::blank(width, height);
                self.blank = Some((width, height, image.data.clone()));
                image
            }
        }
    }

    fn apply_signal(&mut self, raw: &str) {
        match raw.parse::<SignalState>() {
            Ok(state) => {
                if let Some(hook) = self.signal_hook.as_mut() {
                    hook(state);
                }
            }
            Err(e) => warn!(source = %self.source_id, error = %e, "Ignoring unknown signal"),
        }
    }
}

impl FrameSource for ReplaySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn nominal_fps(&self) -> Option<f64> {
        self.nominal_fps
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let index = self.cursor;
        let meta = self.frames.get(index)?.clone();
        self.cursor += 1;

        if let Some(raw) = meta.signal.as_deref() {
            self.apply_signal(raw);
        }

        metrics::counter!("lanewatch_replay_frames_total").increment(1);
        Some(Frame {
            index: index as u64,
            timestamp: meta.timestamp,
            image: self.blank_image(meta.width, meta.height),
        })
    }

    fn release(&mut self) {
        if !self.released {
            debug!(source = %self.source_id, read = self.cursor, "Replay source released");
        }
        self.released = true;
    }
}

/// 回放检测结果：按帧序号查表
#[derive(Debug, Clone, Default)]
pub struct ReplayTracker {
    objects: Vec<Vec<TrackedObject>>,
}

impl DetectorTracker for ReplayTracker {
    fn track(&mut self, frame: &Frame) -> std::result::Result<Vec<TrackedObject>, ContractError> {
        Ok(usize::try_from(frame.index)
            .ok()
            .and_then(|idx| self.objects.get(idx))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const SCENE: &str = r#"{"timestamp": 0.0, "width": 64, "height": 48, "objects": [{"bbox": [1, 2, 11, 22], "track_id": 3, "class_name": "car"}]}

{"timestamp": 0.5, "width": 64, "height": 48, "objects": [], "signal": "RED"}
{"timestamp": 1.0, "width": 64, "height": 48, "signal": "amber"}
"#;

    #[test]
    fn test_parse_and_split() {
        let log = ReplayLog::parse("scene", SCENE).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.nominal_fps(), Some(2.0));

        let (mut source, mut tracker) = log.split();
        let frame = source.read_frame().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert!(frame.image.is_consistent());

        let objects = tracker.track(&frame).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].track_id, Some(3));
        assert_eq!(objects[0].confidence, 1.0);
    }

    #[test]
    fn test_end_of_stream() {
        let (mut source, _) = ReplayLog::parse("scene", SCENE).unwrap().split();
        let mut count = 0;
        while source.read_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_signal_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (source, _) = ReplayLog::parse("scene", SCENE).unwrap().split();
        let mut source = source.with_signal_hook(move |s| sink.lock().unwrap().push(s));

        while source.read_frame().is_some() {}

        // "amber" is ignored
        assert_eq!(*seen.lock().unwrap(), vec![SignalState::Red]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut source, _) = ReplayLog::parse("scene", SCENE).unwrap().split();
        source.release();
        source.release();
        assert!(source.is_released());
        assert!(source.read_frame().is_none());
    }

    #[test]
    fn test_parse_error_line_number() {
        let content = "{\"timestamp\": 0.0, \"width\": 4, \"height\": 4}\nnot json\n";
        let err = ReplayLog::parse("bad", content).unwrap_err();
        assert!(matches!(err, IngestionError::ParseFailed { line: 2, .. }));

        let zero = "{\"timestamp\": 0.0, \"width\": 0, \"height\": 4}\n";
        assert!(matches!(
            ReplayLog::parse("bad", zero),
            Err(IngestionError::InvalidFrame { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReplayLog::load("/nonexistent/scene.jsonl").unwrap_err();
        assert!(matches!(
            ContractError::from(err),
            ContractError::SourceUnavailable { .. }
        ));
    }

    #[test]
    fn test_load_roundtrip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.jsonl");
        let log = ReplayLog::parse("scene", SCENE).unwrap();
        fs::write(&path, log.to_jsonl().unwrap()).unwrap();

        let loaded = ReplayLog::load(&path).unwrap();
        assert_eq!(loaded.records(), log.records());
    }

    #[test]
    fn test_tracker_out_of_range() {
        let (_, mut tracker) = ReplayLog::parse("scene", SCENE).unwrap().split();
        let frame = Frame {
            index: 99,
            timestamp: 0.0,
            image: ImageData::blank(4, 4),
        };
        assert!(tracker.track(&frame).unwrap().is_empty());
    }
}
