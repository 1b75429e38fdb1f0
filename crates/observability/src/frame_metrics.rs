//! 帧处理指标聚合器
//!
//! 滚动窗口 (帧耗时 / 检测数) + 按违规类型累计的告警数 + 会话运行时长。
//! 单一写者 (会话工作线程)，多读者 (查看端) 在锁内复制快照。

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{MetricsSnapshot, ViolationKind};
use ringbuf::{traits::*, HeapRb};

use crate::metrics::{RunningStats, StatsSummary};

struct Inner {
    durations_s: HeapRb<f64>,
    detections: HeapRb<usize>,
    violations: BTreeMap<ViolationKind, u64>,
    started: Instant,
    frames_total: u64,
    latency_ms: RunningStats,
    detection_stats: RunningStats,
}

impl Inner {
    fn new(latency_window: usize, detection_window: usize) -> Self {
        Self {
            durations_s: HeapRb::new(latency_window.max(1)),
            detections: HeapRb::new(detection_window.max(1)),
            violations: BTreeMap::new(),
            started: Instant::now(),
            frames_total: 0,
            latency_ms: RunningStats::default(),
            detection_stats: RunningStats::default(),
        }
    }
}

/// 帧指标聚合器 (线程安全)
pub struct FrameMetrics {
    latency_window: usize,
    detection_window: usize,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for FrameMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMetrics")
            .field("latency_window", &self.latency_window)
            .field("detection_window", &self.detection_window)
            .finish()
    }
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self::new(60, 100)
    }
}

impl FrameMetrics {
    /// 创建聚合器
    pub fn new(latency_window: usize, detection_window: usize) -> Self {
        Self {
            latency_window,
            detection_window,
            inner: Mutex::new(Inner::new(latency_window, detection_window)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 记录一帧的处理耗时与检测数
    pub fn record_frame(&self, duration: Duration, detections: usize) {
        let mut inner = self.lock();
        inner.durations_s.push_overwrite(duration.as_secs_f64());
        inner.detections.push_overwrite(detections);
        inner.frames_total += 1;
        inner.latency_ms.push(duration.as_secs_f64() * 1000.0);
        inner.detection_stats.push(detections as f64);
    }

    /// 累计一条告警
    pub fn record_violation(&self, kind: ViolationKind) {
        *self.lock().violations.entry(kind).or_insert(0) += 1;
    }

    /// 当前快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();

        let avg_duration = mean(inner.durations_s.iter().copied(), inner.durations_s.occupied_len());
        let avg_detections = mean(
            inner.detections.iter().map(|&d| d as f64),
            inner.detections.occupied_len(),
        );

        MetricsSnapshot {
            fps: if avg_duration > 0.0 {
                1.0 / avg_duration
            } else {
                0.0
            },
            avg_process_time_ms: avg_duration * 1000.0,
            avg_detections,
            violations: inner
                .violations
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect(),
            uptime_seconds: inner.started.elapsed().as_secs_f64(),
        }
    }

    /// 会话开始：清空窗口、计数并重置起始时间
    pub fn reset(&self) {
        *self.lock() = Inner::new(self.latency_window, self.detection_window);
    }

    /// 仅清空违规计数
    pub fn reset_violations(&self) {
        self.lock().violations.clear();
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let inner = self.lock();
        MetricsSummary {
            total_frames: inner.frames_total,
            uptime_seconds: inner.started.elapsed().as_secs_f64(),
            latency_ms: StatsSummary::from(&inner.latency_ms),
            detections: StatsSummary::from(&inner.detection_stats),
            violations: inner
                .violations
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, len: usize) -> f64 {
    if len == 0 {
        0.0
    } else {
        values.sum::<f64>() / len as f64
    }
}

/// 指标摘要 (整个会话)
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub uptime_seconds: f64,
    pub latency_ms: StatsSummary,
    pub detections: StatsSummary,
    pub violations: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Rule Engine Metrics Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Uptime: {:.2}s", self.uptime_seconds)?;
        writeln!(f, "Frame latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Detections per frame: {}", self.detections)?;

        if !self.violations.is_empty() {
            writeln!(f, "Alerts by kind:")?;
            for (kind, count) in &self.violations {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}
