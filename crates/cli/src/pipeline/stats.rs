//! Run summary printed when a session ends.

use std::time::Duration;

use contracts::{Alert, MetricsSnapshot};
use dispatcher::SinkMetricsSnapshot;
use observability::MetricsSummary;

/// Statistics from one session run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Frames processed by the session worker
    pub frames: u64,

    /// Stopped by a shutdown signal rather than end of stream
    pub interrupted: bool,

    /// Session worker joined within the timeout
    pub joined: bool,

    /// Rolling metrics at the end of the run
    pub metrics: MetricsSnapshot,

    /// Cumulative latency / detection statistics
    pub frame_summary: MetricsSummary,

    /// Most recent alerts, newest first
    pub recent_alerts: Vec<Alert>,

    /// Delivery counters per sink
    pub sinks: Vec<(String, SinkMetricsSnapshot)>,
}

impl RunSummary {
    /// Alerts emitted in this run, all kinds
    pub fn total_alerts(&self) -> u64 {
        self.metrics.violations.values().sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                       Session Summary                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames processed: {}", self.frames);
        println!("   ├─ Processing FPS: {:.2}", self.metrics.fps);
        println!("   ├─ Avg process time: {:.2} ms", self.metrics.avg_process_time_ms);
        println!("   ├─ Avg detections: {:.2}", self.metrics.avg_detections);
        println!(
            "   └─ Ended by: {}",
            if self.interrupted { "shutdown signal" } else { "end of stream" }
        );

        println!("\n🚨 Alerts ({})", self.total_alerts());
        if self.metrics.violations.is_empty() {
            println!("   └─ none");
        }
        let kinds = self.metrics.violations.len();
        for (i, (kind, count)) in self.metrics.violations.iter().enumerate() {
            let prefix = if i + 1 == kinds { "└─" } else { "├─" };
            println!("   {prefix} {kind}: {count}");
        }

        if !self.recent_alerts.is_empty() {
            println!("\n🕑 Most recent");
            for alert in self.recent_alerts.iter().take(5) {
                let track = alert
                    .track_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                println!(
                    "   ├─ t={:.2}s {} track={} {}",
                    alert.ts,
                    alert.kind,
                    track,
                    serde_json::Value::Object(alert.info.clone())
                );
            }
        }

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (name, snapshot) in &self.sinks {
                println!("   ├─ {name}: {snapshot}");
            }
        }

        println!("\n📈 Latency\n   └─ {}", self.frame_summary.latency_ms);

        if !self.joined {
            println!("\n⚠️  Session worker did not stop within the join timeout");
        }

        println!();
    }
}
