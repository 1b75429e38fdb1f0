//! Session - explicit, caller-owned processor lifecycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    Alert, AlertFeed, ContractError, DetectorTracker, EvidenceStore, FrameSource, MetricsSnapshot,
    RoiConfig, RuleEngineConfig, SessionConfig, SignalState, SiteBlueprint,
};
use dispatcher::{AlertManager, FileEvidenceStore, LifecycleConfig};
use observability::FrameMetrics;
use rule_engine::{Classifiers, RuleEngine};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::error::SessionError;
use crate::published::PublishedFrame;
use crate::signal::SignalControl;
use crate::worker::{lock, release_source, LatestFrame, SharedSource, Worker};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Static inputs of every session run
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub roi: RoiConfig,
    pub engine: RuleEngineConfig,
    pub session: SessionConfig,
    /// Used when the source reports no frame rate
    pub nominal_fps: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            roi: RoiConfig::default(),
            engine: RuleEngineConfig::default(),
            session: SessionConfig::default(),
            nominal_fps: 30.0,
        }
    }
}

impl SessionSettings {
    pub fn from_blueprint(blueprint: &SiteBlueprint) -> Self {
        Self {
            roi: blueprint.roi.clone(),
            engine: blueprint.engine.clone(),
            session: blueprint.session.clone(),
            nominal_fps: blueprint.site.nominal_fps,
        }
    }
}

struct RunningWorker {
    running: Arc<AtomicBool>,
    source: SharedSource,
    source_id: String,
    handle: JoinHandle<()>,
}

/// Traffic rule session
///
/// Owns the shared state read by the presentation layer (alert log,
/// metrics, latest frame, signal) and at most one worker thread.
pub struct Session {
    settings: SessionSettings,
    alerts: Arc<AlertManager>,
    metrics: Arc<FrameMetrics>,
    signal: SignalControl,
    latest: LatestFrame,
    worker: Option<RunningWorker>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.is_running())
            .field("signal", &self.signal.get())
            .field("alerts", &self.alerts)
            .finish()
    }
}

impl Session {
    pub fn new(settings: SessionSettings, evidence: Option<Arc<dyn EvidenceStore>>) -> Self {
        let metrics = Arc::new(FrameMetrics::new(
            settings.session.latency_window,
            settings.session.detection_window,
        ));
        let mut alerts =
            AlertManager::new(LifecycleConfig::from(&settings.engine), Arc::clone(&metrics));
        if let Some(store) = evidence {
            alerts = alerts.with_evidence_store(store);
        }

        Self {
            settings,
            alerts: Arc::new(alerts),
            metrics,
            signal: SignalControl::default(),
            latest: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    /// Session with a file evidence store when the blueprint enables one
    pub fn from_blueprint(blueprint: &SiteBlueprint) -> Result<Self, SessionError> {
        let evidence: Option<Arc<dyn EvidenceStore>> = if blueprint.evidence.enabled {
            Some(Arc::new(FileEvidenceStore::new(&blueprint.evidence)?))
        } else {
            None
        };
        Ok(Self::new(SessionSettings::from_blueprint(blueprint), evidence))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start a new run
    ///
    /// Any running worker is stopped first. `open` runs synchronously; when it
    /// fails no worker is spawned and the previous state is left as stopped.
    /// Per-session state (tracks, cooldowns, highlights, metrics) starts
    /// empty; the alert log is kept.
    #[instrument(name = "session_start", skip_all)]
    pub fn start<F>(
        &mut self,
        open: F,
        tracker: Box<dyn DetectorTracker>,
        classifiers: Classifiers,
    ) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>, ContractError>,
    {
        self.stop();

        let source = open().map_err(|e| {
            warn!(error = %e, "Frame source unavailable");
            SessionError::SourceUnavailable(e)
        })?;
        let source_id = source.source_id().to_string();
        let fps = source
            .nominal_fps()
            .filter(|fps| *fps > 0.0 && fps.is_finite())
            .unwrap_or(self.settings.nominal_fps);

        // a detached worker from an earlier run compares against this epoch
        let epoch = self.alerts.reset_session();
        {
            let mut latest = lock(&self.latest);
            self.metrics.reset();
            *latest = None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let source: SharedSource = Arc::new(Mutex::new(Some(source)));
        let worker = Worker {
            running: Arc::clone(&running),
            source: Arc::clone(&source),
            tracker,
            classifiers,
            engine: RuleEngine::new(self.settings.roi.clone(), self.settings.engine.clone()),
            alerts: Arc::clone(&self.alerts),
            metrics: Arc::clone(&self.metrics),
            signal: self.signal.clone(),
            latest: Arc::clone(&self.latest),
            pacing: self.settings.session.pacing_interval(fps),
            epoch,
        };

        let spawned = thread::Builder::new()
            .name("lanewatch-session".into())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                release_source(&mut lock(&source));
                return Err(SessionError::Spawn(e));
            }
        };

        metrics::gauge!("lanewatch_session_running").set(1.0);
        info!(source = %source_id, fps, epoch, "Session started");
        self.worker = Some(RunningWorker {
            running,
            source,
            source_id,
            handle,
        });
        Ok(())
    }

    /// Stop the current run, waiting at most the configured join timeout
    ///
    /// Returns false when the worker did not finish in time. The source is
    /// released either way: here if the worker is not inside a read,
    /// otherwise by the worker when its read returns.
    #[instrument(name = "session_stop", skip(self))]
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        worker.running.store(false, Ordering::Release);

        let deadline = Instant::now() + self.settings.session.join_timeout();
        while !worker.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        let joined = worker.handle.is_finished();
        if joined {
            if worker.handle.join().is_err() {
                warn!(source = %worker.source_id, "Session worker panicked");
            }
        } else {
            warn!(
                source = %worker.source_id,
                timeout_ms = self.settings.session.join_timeout_ms,
                "Session worker did not stop in time, detaching"
            );
        }

        match worker.source.try_lock() {
            Ok(mut source) => release_source(&mut source),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                release_source(&mut poisoned.into_inner())
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                warn!(source = %worker.source_id, "Source busy, worker will release it");
            }
        }

        metrics::gauge!("lanewatch_session_running").set(0.0);
        info!(source = %worker.source_id, joined, "Session stopped");
        joined
    }

    /// True while a worker is processing frames
    ///
    /// Becomes false on its own at end of stream.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::Acquire))
    }

    /// Signal state plus the alert log, most recent first
    pub fn recent_alerts(&self) -> AlertFeed {
        AlertFeed {
            signal: self.signal.get(),
            alerts: self.alerts.recent_alerts(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn latest_frame(&self) -> Option<Arc<PublishedFrame>> {
        lock(&self.latest).clone()
    }

    /// Update the signal; unrecognized values are ignored
    pub fn set_signal_state(&self, value: &str) -> bool {
        self.signal.set_from_str(value)
    }

    pub fn signal_state(&self) -> SignalState {
        self.signal.get()
    }

    /// Handle for sources or controllers that update the signal
    pub fn signal_control(&self) -> SignalControl {
        self.signal.clone()
    }

    /// Push channel of emitted alerts
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub fn frame_metrics(&self) -> &Arc<FrameMetrics> {
        &self.metrics
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        // a detached worker may still hold the manager; subscribers must not wait on it
        self.alerts.close();
    }
}
