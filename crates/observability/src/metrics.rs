//! 指标记录模块
//!
//! `metrics` facade 上的规则引擎 / 告警 / 取证指标，以及在线统计工具。

use contracts::ViolationKind;
use metrics::{counter, gauge, histogram};

/// 记录一帧处理完成
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_processed;
///
/// let started = Instant::now();
/// // ... evaluate rules ...
/// record_frame_processed(started.elapsed().as_secs_f64() * 1000.0, objects.len());
/// ```
pub fn record_frame_processed(duration_ms: f64, detections: usize) {
    counter!("lanewatch_frames_processed_total").increment(1);
    histogram!("lanewatch_frame_latency_ms").record(duration_ms);
    histogram!("lanewatch_detections_per_frame").record(detections as f64);
}

/// 记录告警发出
pub fn record_alert_emitted(kind: ViolationKind) {
    counter!("lanewatch_alerts_emitted_total", "kind" => kind.as_str()).increment(1);
}

/// 记录冷却窗口内被抑制的违规事件
pub fn record_alert_suppressed(kind: ViolationKind) {
    counter!("lanewatch_alerts_suppressed_total", "kind" => kind.as_str()).increment(1);
}

/// 记录取证保存结果
pub fn record_evidence_saved(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("lanewatch_evidence_saved_total", "status" => status).increment(1);
}

/// 记录外部协作者 (检测器/分类器/OCR) 失败
pub fn record_collaborator_failure(name: &str) {
    counter!(
        "lanewatch_collaborator_failures_total",
        "collaborator" => name.to_string()
    )
    .increment(1);
}

/// 记录活跃跟踪目标数
pub fn record_active_tracks(count: usize) {
    gauge!("lanewatch_active_tracks").set(count as f64);
}

/// 记录因空闲超时被清理的跟踪目标
pub fn record_tracks_evicted(count: usize) {
    if count > 0 {
        counter!("lanewatch_tracks_evicted_total").increment(count as u64);
    }
}

/// 记录车道方向重新估计
pub fn record_direction_update(lane: usize) {
    counter!(
        "lanewatch_lane_direction_updates_total",
        "lane" => lane.to_string()
    )
    .increment(1);
}

/// 记录告警分发
pub fn record_alert_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "lanewatch_alerts_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_stats_summary_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");

        let mut stats = RunningStats::default();
        stats.push(10.0);
        stats.push(20.0);
        let text = StatsSummary::from(&stats).to_string();
        assert!(text.contains("mean=15.000"));
        assert!(text.contains("(n=2)"));
    }

    #[test]
    fn test_recorders_without_recorder_installed() {
        // metrics facade is a no-op until a recorder is installed
        record_frame_processed(12.5, 3);
        record_alert_emitted(ViolationKind::WrongWay);
        record_alert_suppressed(ViolationKind::WrongWay);
        record_evidence_saved(false);
        record_collaborator_failure("plate_reader");
        record_tracks_evicted(0);
    }
}
