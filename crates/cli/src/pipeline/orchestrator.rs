//! Pipeline orchestrator - wires replay, session and dispatcher.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{FrameSource, SiteBlueprint};
use ingestion::ReplayLog;
use rule_engine::Classifiers;
use session::Session;
use tracing::{info, warn};

use super::{FrameLimit, RunSummary};

/// How often the orchestrator checks whether the session ended
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for sinks to drain after the session stops
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The site configuration
    pub blueprint: SiteBlueprint,

    /// Replay file (falls back to `site.source`)
    pub replay_path: Option<PathBuf>,

    /// Initial signal state
    pub initial_signal: Option<String>,

    /// Maximum number of frames (None = until end of stream)
    pub max_frames: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn replay_path(&self) -> Result<PathBuf> {
        self.config
            .replay_path
            .clone()
            .or_else(|| self.config.blueprint.site.source.as_ref().map(PathBuf::from))
            .context("No replay file: pass --replay or set site.source")
    }

    /// Run one session until end of stream or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunSummary> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let replay_path = self.replay_path()?;
        let log = ReplayLog::load(&replay_path)
            .with_context(|| format!("Replay unavailable: {}", replay_path.display()))?;

        let mut session = Session::from_blueprint(blueprint).context("Failed to create session")?;
        if let Some(ref signal) = self.config.initial_signal {
            if !session.set_signal_state(signal) {
                warn!(signal = %signal, "Unknown initial signal state, keeping green");
            }
        }
        warn_missing_classifiers(blueprint);

        let dispatcher =
            dispatcher::create_dispatcher(blueprint.sinks.clone(), session.subscribe())
                .context("Failed to create dispatcher")?;
        let sink_metrics = dispatcher.metrics_handles();
        let dispatcher_handle = dispatcher.spawn();

        let signal = session.signal_control();
        let (source, tracker) = log.split();
        let source = source.with_signal_hook(move |state| signal.set(state));
        let source: Box<dyn FrameSource> = match self.config.max_frames {
            Some(max) => Box::new(FrameLimit::new(Box::new(source), max)),
            None => Box::new(source),
        };

        session
            .start(move || Ok(source), Box::new(tracker), Classifiers::none())
            .context("Failed to start session")?;

        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        let interrupted = loop {
            tokio::select! {
                _ = &mut shutdown => break true,
                _ = ticker.tick() => {
                    if !session.is_running() {
                        break false;
                    }
                }
            }
        };

        let joined = tokio::task::block_in_place(|| session.stop());
        let metrics = session.metrics();
        let frame_summary = session.frame_metrics().summary();
        let recent_alerts = session.recent_alerts().alerts;

        // Close the push channel even if a detached worker still holds the manager
        session.alert_manager().close();
        drop(session);
        match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not drain in time"),
        }

        Ok(RunSummary {
            duration: start_time.elapsed(),
            frames: frame_summary.total_frames,
            interrupted,
            joined,
            metrics,
            frame_summary,
            recent_alerts,
            sinks: sink_metrics
                .into_iter()
                .map(|(name, metrics)| (name, metrics.snapshot()))
                .collect(),
        })
    }
}

/// Classifier backends are provided by embedding applications, not the CLI
fn warn_missing_classifiers(blueprint: &SiteBlueprint) {
    if let Some(ref model) = blueprint.roi.helmet_model_path {
        warn!(model = %model, "No helmet classifier backend available, helmet rule disabled");
    }
    if let Some(ref model) = blueprint.roi.plate_model_path {
        warn!(model = %model, "No plate reader backend available, plate reading disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Alert, LineSegment, Point, SignalState, SinkConfig, SinkType};
    use ingestion::{MockScene, ScriptedTrack};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn blueprint(sink_path: &std::path::Path) -> SiteBlueprint {
        let toml = r#"
[site]
name = "test"
"#;
        let mut blueprint =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        blueprint.roi.stop_line =
            Some(LineSegment::new(Point::new(0.0, 0.5), Point::new(1.0, 0.5)));
        blueprint.session.pacing_factor = 0.0;
        blueprint.evidence.enabled = false;
        blueprint.sinks = vec![SinkConfig {
            name: "jsonl".into(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params: HashMap::from([("path".to_string(), sink_path.display().to_string())]),
        }];
        blueprint
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replay_run_writes_sink() {
        let dir = tempdir().unwrap();
        let replay = dir.path().join("scene.jsonl");
        let sink_path = dir.path().join("alerts.jsonl");

        // Car parked on the stop line, signal turns red at frame 5
        let scene = MockScene::new(100, 100, 10.0, 30)
            .with_track(ScriptedTrack::new(4, "car", Point::new(50.0, 50.0)).sized(10.0, 10.0))
            .with_signal(5, SignalState::Red);
        fs::write(&replay, scene.to_log().to_jsonl().unwrap()).unwrap();

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(&sink_path),
            replay_path: Some(replay),
            initial_signal: None,
            max_frames: None,
            metrics_port: None,
        });
        let summary = pipeline.run(std::future::pending()).await.unwrap();

        assert!(!summary.interrupted);
        assert!(summary.joined);
        assert_eq!(summary.frames, 30);
        assert_eq!(summary.total_alerts(), 1);
        assert_eq!(summary.sinks[0].1.delivered, 1);

        let lines = fs::read_to_string(&sink_path).unwrap();
        let alerts: Vec<Alert> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].track_id, Some(4));
        assert!((alerts[0].ts - 0.5).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_max_frames() {
        let dir = tempdir().unwrap();
        let replay = dir.path().join("scene.jsonl");
        fs::write(
            &replay,
            MockScene::new(50, 50, 10.0, 40).to_log().to_jsonl().unwrap(),
        )
        .unwrap();

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(&dir.path().join("alerts.jsonl")),
            replay_path: Some(replay),
            initial_signal: Some("green".into()),
            max_frames: Some(12),
            metrics_port: None,
        });
        let summary = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(summary.frames, 12);
        assert_eq!(summary.total_alerts(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_replay_fails() {
        let dir = tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(&dir.path().join("alerts.jsonl")),
            replay_path: Some(dir.path().join("missing.jsonl")),
            initial_signal: None,
            max_frames: None,
            metrics_port: None,
        });
        assert!(pipeline.run(std::future::pending()).await.is_err());
    }
}
