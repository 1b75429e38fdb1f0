//! Per-frame pull, evaluate, publish loop running on a dedicated thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{DetectorTracker, Frame, FrameSource};
use dispatcher::AlertManager;
use observability::{record_collaborator_failure, record_frame_processed, FrameMetrics};
use rule_engine::{Classifiers, FrameEvaluation, RuleEngine};
use tracing::{debug, info, instrument, warn};

use crate::published::{Annotation, PublishedFrame};
use crate::signal::SignalControl;

/// Seconds of session clock between cooldown/highlight prunes
const PRUNE_INTERVAL_S: f64 = 5.0;

pub(crate) type SharedSource = Arc<Mutex<Option<Box<dyn FrameSource>>>>;
pub(crate) type LatestFrame = Arc<Mutex<Option<Arc<PublishedFrame>>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Release the source if present; idempotent
pub(crate) fn release_source(source: &mut Option<Box<dyn FrameSource>>) {
    if let Some(mut source) = source.take() {
        source.release();
        debug!(source = %source.source_id(), "Frame source released");
    }
}

/// Everything the worker owns or shares for one session
pub(crate) struct Worker {
    pub running: Arc<AtomicBool>,
    pub source: SharedSource,
    pub tracker: Box<dyn DetectorTracker>,
    pub classifiers: Classifiers,
    pub engine: RuleEngine,
    pub alerts: Arc<AlertManager>,
    pub metrics: Arc<FrameMetrics>,
    pub signal: SignalControl,
    pub latest: LatestFrame,
    pub pacing: Option<Duration>,
    /// Alert manager epoch of the run this worker belongs to
    pub epoch: u64,
}

impl Worker {
    #[instrument(name = "session_worker", skip(self), fields(epoch = self.epoch, pacing = ?self.pacing))]
    pub fn run(mut self) {
        info!("Session worker started");
        let mut frames: u64 = 0;
        let mut last_prune: Option<f64> = None;

        while self.running.load(Ordering::Acquire) {
            let Some(frame) = self.read_frame() else {
                info!(frames, "End of stream, stopping session");
                break;
            };
            // stop() may have given up on us while the read was blocked
            if !self.is_current() {
                debug!(frame_index = frame.index, "Session ended during read, frame dropped");
                break;
            }
            frames += 1;

            let now = frame.timestamp;
            self.process(frame);

            if last_prune.map_or(true, |last| now - last >= PRUNE_INTERVAL_S) {
                let removed = self.alerts.prune(now);
                if removed > 0 {
                    debug!(removed, "Pruned alert lifecycle state");
                }
                last_prune = Some(now);
            }

            if let Some(pacing) = self.pacing {
                std::thread::sleep(pacing);
            }
        }

        self.running.store(false, Ordering::Release);
        release_source(&mut lock(&self.source));
        info!(frames, "Session worker stopped");
    }

    /// Still running and still the newest run
    fn is_current(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.alerts.epoch() == self.epoch
    }

    fn read_frame(&self) -> Option<Frame> {
        lock(&self.source).as_mut()?.read_frame()
    }

    fn process(&mut self, frame: Frame) {
        let started = Instant::now();

        let objects = match self.tracker.track(&frame) {
            Ok(objects) => objects,
            Err(e) => {
                warn!(frame_index = frame.index, error = %e, "Detector failed, frame skipped");
                record_collaborator_failure("detector_tracker");
                Vec::new()
            }
        };

        let signal = self.signal.get();
        let FrameEvaluation {
            events,
            observations,
        } = self
            .engine
            .evaluate(&frame, &objects, signal, &mut self.classifiers);

        let now = frame.timestamp;
        for event in events {
            self.alerts.emit_in(self.epoch, event, Some(&frame), now);
        }

        let annotations = observations
            .into_iter()
            .map(|obs| Annotation {
                highlighted: obs
                    .object
                    .track_id
                    .is_some_and(|id| self.alerts.is_highlighted(id, now)),
                track_id: obs.object.track_id,
                class_name: obs.object.class_name,
                bbox: obs.object.bbox,
                lane: obs.lane,
                labels: obs.labels,
            })
            .collect();

        let published = PublishedFrame {
            frame,
            signal,
            annotations,
            focus: self.alerts.focus(now),
            learning_progress: self.engine.learning_progress(),
            learning_complete: self.engine.learning_complete(),
        };
        let elapsed = started.elapsed();

        // Session::start bumps the epoch before clearing both under this lock
        let mut latest = lock(&self.latest);
        if self.alerts.epoch() != self.epoch {
            debug!("Session replaced, frame not published");
            return;
        }
        *latest = Some(Arc::new(published));
        self.metrics.record_frame(elapsed, objects.len());
        drop(latest);
        record_frame_processed(elapsed.as_secs_f64() * 1000.0, objects.len());
    }
}
