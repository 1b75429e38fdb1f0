//! Mock 场景
//!
//! 脚本化的匀速目标，用于测试与演示，无需真实视频或检测器。

use contracts::{BBox, Point, SignalState, TrackedObject};

use crate::replay::{ReplayLog, ReplayRecord};

/// 匀速运动的脚本目标
#[derive(Debug, Clone)]
pub struct ScriptedTrack {
    pub track_id: Option<u64>,
    pub class_name: String,
    /// 首帧中心 (像素)
    pub start: Point,
    /// 速度 (像素/秒)
    pub velocity: (f64, f64),
    /// 边框宽高 (像素)
    pub size: (f64, f64),
    /// 出现的帧区间 [first, last]
    pub frames: (u64, u64),
}

impl ScriptedTrack {
    pub fn new(track_id: u64, class_name: impl Into<String>, start: Point) -> Self {
        Self {
            track_id: Some(track_id),
            class_name: class_name.into(),
            start,
            velocity: (0.0, 0.0),
            size: (40.0, 40.0),
            frames: (0, u64::MAX),
        }
    }

    pub fn untracked(mut self) -> Self {
        self.track_id = None;
        self
    }

    pub fn moving(mut self, vx: f64, vy: f64) -> Self {
        self.velocity = (vx, vy);
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.size = (width, height);
        self
    }

    pub fn between(mut self, first: u64, last: u64) -> Self {
        self.frames = (first, last);
        self
    }

    /// 第 `index` 帧的目标 (不在区间内为 None)
    fn at(&self, index: u64, elapsed: f64) -> Option<TrackedObject> {
        let (first, last) = self.frames;
        if index < first || index > last {
            return None;
        }
        let cx = self.start.x + self.velocity.0 * elapsed;
        let cy = self.start.y + self.velocity.1 * elapsed;
        let (hw, hh) = (self.size.0 / 2.0, self.size.1 / 2.0);
        Some(TrackedObject::new(
            BBox::new(cx - hw, cy - hh, cx + hw, cy + hh),
            self.track_id,
            self.class_name.clone(),
        ))
    }
}

/// 脚本场景
#[derive(Debug, Clone)]
pub struct MockScene {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u64,
    tracks: Vec<ScriptedTrack>,
    signals: Vec<(u64, SignalState)>,
}

impl MockScene {
    pub fn new(width: u32, height: u32, fps: f64, frame_count: u64) -> Self {
        Self {
            width,
            height,
            fps: if fps > 0.0 { fps } else { 30.0 },
            frame_count,
            tracks: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: ScriptedTrack) -> Self {
        self.tracks.push(track);
        self
    }

    /// 在第 `frame` 帧切换信号灯
    pub fn with_signal(mut self, frame: u64, state: SignalState) -> Self {
        self.signals.push((frame, state));
        self
    }

    /// 第 `index` 帧的时间戳
    pub fn timestamp(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }

    /// 第 `index` 帧的全部目标
    pub fn objects_at(&self, index: u64) -> Vec<TrackedObject> {
        self.tracks
            .iter()
            .filter_map(|track| {
                let elapsed = self.timestamp(index) - self.timestamp(track.frames.0);
                track.at(index, elapsed)
            })
            .collect()
    }

    /// 渲染为回放日志
    pub fn to_log(&self) -> ReplayLog {
        let records = (0..self.frame_count)
            .map(|index| ReplayRecord {
                timestamp: self.timestamp(index),
                width: self.width,
                height: self.height,
                objects: self.objects_at(index),
                signal: self
                    .signals
                    .iter()
                    .rev()
                    .find(|(frame, _)| *frame == index)
                    .map(|(_, state)| signal_name(*state).to_string()),
            })
            .collect();
        ReplayLog::from_records("mock_scene", records)
    }
}

fn signal_name(state: SignalState) -> &'static str {
    match state {
        SignalState::Red => "red",
        SignalState::Green => "green",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DetectorTracker, FrameSource};

    #[test]
    fn test_linear_motion() {
        let scene = MockScene::new(640, 480, 10.0, 20)
            .with_track(ScriptedTrack::new(1, "car", Point::new(100.0, 400.0)).moving(0.0, -50.0));

        let first = scene.objects_at(0);
        let later = scene.objects_at(10);
        assert_eq!(first[0].bbox.centroid(), Point::new(100.0, 400.0));
        assert_eq!(later[0].bbox.centroid(), Point::new(100.0, 350.0));
    }

    #[test]
    fn test_track_window() {
        let scene = MockScene::new(640, 480, 10.0, 20).with_track(
            ScriptedTrack::new(2, "bus", Point::new(10.0, 10.0))
                .moving(10.0, 0.0)
                .between(5, 8),
        );
        assert!(scene.objects_at(4).is_empty());
        // Motion is measured from the first visible frame
        assert_eq!(scene.objects_at(5)[0].bbox.centroid(), Point::new(10.0, 10.0));
        assert!(scene.objects_at(9).is_empty());
    }

    #[test]
    fn test_to_log_replays() {
        let scene = MockScene::new(64, 48, 20.0, 4)
            .with_track(ScriptedTrack::new(1, "car", Point::new(20.0, 20.0)).untracked())
            .with_signal(2, SignalState::Red);

        let log = scene.to_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log.records()[2].signal.as_deref(), Some("red"));
        assert!((log.nominal_fps().unwrap() - 20.0).abs() < 1e-9);

        let (mut source, mut tracker) = log.split();
        let frame = source.read_frame().unwrap();
        let objects = tracker.track(&frame).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].track_id, None);
    }
}
