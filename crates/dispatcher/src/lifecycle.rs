//! Alert lifecycle manager.
//!
//! Turns raw violation events into alerts: cooldown per (track, kind),
//! evidence capture, highlight and focus windows, the bounded alert log,
//! per-kind counters and the push channel for subscribers.
//!
//! Cooldown admission happens under the state lock, so at most one caller can
//! win a given key per window and evidence is captured exactly once for it.
//! Evidence I/O runs outside every lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{Alert, EvidenceStore, Frame, RuleEngineConfig, ViolationEvent, ViolationKind};
use observability::{record_alert_emitted, record_alert_suppressed, record_evidence_saved, FrameMetrics};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::alert_log::AlertLog;

/// Default capacity of the subscriber broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type CooldownKey = (Option<u64>, ViolationKind);

/// Time windows applied to emitted alerts (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleConfig {
    pub cooldown_s: f64,
    pub highlight_s: f64,
    pub focus_s: f64,
    pub log_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::from(&RuleEngineConfig::default())
    }
}

impl From<&RuleEngineConfig> for LifecycleConfig {
    fn from(config: &RuleEngineConfig) -> Self {
        Self {
            cooldown_s: config.cooldown_s,
            highlight_s: config.highlight_s,
            focus_s: config.focus_s,
            log_capacity: config.alert_log_capacity,
        }
    }
}

#[derive(Debug, Default)]
struct AlertState {
    /// Bumped by every session reset
    epoch: u64,
    cooldowns: HashMap<CooldownKey, f64>,
    highlights: HashMap<u64, f64>,
    focus: Option<(u64, f64)>,
}

enum Admission {
    Admitted,
    CoolingDown,
    Stale,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Debounced alert emission with evidence correlation
pub struct AlertManager {
    config: LifecycleConfig,
    state: Mutex<AlertState>,
    log: AlertLog,
    evidence: Option<Arc<dyn EvidenceStore>>,
    metrics: Arc<FrameMetrics>,
    publisher: Mutex<Option<broadcast::Sender<Alert>>>,
}

impl std::fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManager")
            .field("config", &self.config)
            .field("log", &self.log)
            .field("evidence", &self.evidence.is_some())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl AlertManager {
    pub fn new(config: LifecycleConfig, metrics: Arc<FrameMetrics>) -> Self {
        let (publisher, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            log: AlertLog::new(config.log_capacity),
            config,
            state: Mutex::new(AlertState::default()),
            evidence: None,
            metrics,
            publisher: Mutex::new(Some(publisher)),
        }
    }

    /// Attach an evidence store
    pub fn with_evidence_store(mut self, store: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = Some(store);
        self
    }

    /// Replace the subscriber channel with one of the given capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        let (publisher, _) = broadcast::channel(capacity.max(1));
        self.publisher = Mutex::new(Some(publisher));
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, AlertState> {
        lock(&self.state)
    }

    /// Emit an alert for `event` unless its key is cooling down
    ///
    /// `frame` is used for evidence capture of non-informational kinds that
    /// carry a box. Returns the alert when one was emitted.
    pub fn emit(&self, event: ViolationEvent, frame: Option<&Frame>, now: f64) -> Option<Alert> {
        self.emit_checked(None, event, frame, now)
    }

    /// Like [`emit`](Self::emit), but only while `epoch` is the current
    /// session epoch
    ///
    /// Events from a worker that outlived its session are discarded.
    pub fn emit_in(
        &self,
        epoch: u64,
        event: ViolationEvent,
        frame: Option<&Frame>,
        now: f64,
    ) -> Option<Alert> {
        self.emit_checked(Some(epoch), event, frame, now)
    }

    #[instrument(
        level = "debug",
        name = "alert_manager_emit",
        skip(self, event, frame),
        fields(kind = %event.kind, track_id = ?event.track_id)
    )]
    fn emit_checked(
        &self,
        epoch: Option<u64>,
        event: ViolationEvent,
        frame: Option<&Frame>,
        now: f64,
    ) -> Option<Alert> {
        match self.admit(epoch, &event, now) {
            Admission::Admitted => {}
            Admission::CoolingDown => {
                record_alert_suppressed(event.kind);
                return None;
            }
            Admission::Stale => {
                debug!("Event from a finished session discarded");
                return None;
            }
        }

        let evidence_id = self.capture_evidence(&event, frame);

        let alert = Alert {
            ts: now,
            kind: event.kind,
            track_id: event.track_id,
            info: event.info,
            vehicle_class: event.vehicle_class,
            evidence_id,
        };

        self.log.push(alert.clone());
        record_alert_emitted(alert.kind);

        info!(
            kind = %alert.kind,
            track_id = ?alert.track_id,
            vehicle_class = alert.vehicle_class.as_deref().unwrap_or("obj"),
            evidence = alert.evidence_id.as_deref().unwrap_or("-"),
            "Alert emitted"
        );

        if let Some(publisher) = lock(&self.publisher).as_ref() {
            // no receivers is not an error
            let _ = publisher.send(alert.clone());
        }
        Some(alert)
    }

    /// Epoch check, cooldown and window bookkeeping in one critical section
    ///
    /// The violation counter is bumped here too, so a session reset either
    /// sees it and clears it or the event is rejected as stale.
    fn admit(&self, epoch: Option<u64>, event: &ViolationEvent, now: f64) -> Admission {
        let mut state = self.lock_state();
        if epoch.is_some_and(|e| e != state.epoch) {
            return Admission::Stale;
        }
        let key = (event.track_id, event.kind);

        if let Some(&last) = state.cooldowns.get(&key) {
            if now - last < self.config.cooldown_s {
                debug!(elapsed = now - last, "Suppressed within cooldown");
                return Admission::CoolingDown;
            }
        }
        state.cooldowns.insert(key, now);
        self.metrics.record_violation(event.kind);

        if let Some(track_id) = event.track_id {
            if !event.kind.is_informational() {
                state
                    .highlights
                    .insert(track_id, now + self.config.highlight_s);
            }
            if event.kind == ViolationKind::WrongWay {
                state.focus = Some((track_id, now + self.config.focus_s));
            }
        }
        Admission::Admitted
    }

    fn capture_evidence(&self, event: &ViolationEvent, frame: Option<&Frame>) -> Option<String> {
        if event.kind.is_informational() {
            return None;
        }
        let store = self.evidence.as_ref()?;
        let frame = frame?;
        let bbox = event.bbox.as_ref()?;

        match store.save_violation(event.kind, event.track_id, frame, bbox, &event.info) {
            Ok(id) => {
                record_evidence_saved(true);
                Some(id)
            }
            Err(e) => {
                record_evidence_saved(false);
                warn!(kind = %event.kind, track_id = ?event.track_id, error = %e, "Evidence capture failed");
                None
            }
        }
    }

    /// Alert log snapshot, most recent first
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.log.snapshot()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Whether the track is inside its highlight window
    pub fn is_highlighted(&self, track_id: u64, now: f64) -> bool {
        self.lock_state()
            .highlights
            .get(&track_id)
            .is_some_and(|&until| now < until)
    }

    /// Tracks currently highlighted
    pub fn highlighted_tracks(&self, now: f64) -> Vec<u64> {
        let mut tracks: Vec<u64> = self
            .lock_state()
            .highlights
            .iter()
            .filter(|&(_, &until)| now < until)
            .map(|(&id, _)| id)
            .collect();
        tracks.sort_unstable();
        tracks
    }

    /// Focused (wrong-way) track, if its window is still open
    pub fn focus(&self, now: f64) -> Option<u64> {
        self.lock_state()
            .focus
            .filter(|&(_, until)| now < until)
            .map(|(id, _)| id)
    }

    /// New receiver on the alert push channel
    ///
    /// After [`close`](Self::close) the receiver reports the channel closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        match lock(&self.publisher).as_ref() {
            Some(publisher) => publisher.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.publisher)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop the push channel; subscribers drain and then see it closed
    ///
    /// Emission keeps working for the log and counters.
    pub fn close(&self) {
        if lock(&self.publisher).take().is_some() {
            debug!("Alert push channel closed");
        }
    }

    pub fn metrics(&self) -> &Arc<FrameMetrics> {
        &self.metrics
    }

    /// Forget cooldowns, highlights and focus and start a new epoch
    ///
    /// The alert log is kept. Returns the new epoch.
    pub fn reset_session(&self) -> u64 {
        let mut state = self.lock_state();
        let epoch = state.epoch + 1;
        *state = AlertState {
            epoch,
            ..AlertState::default()
        };
        debug!(epoch, "Alert lifecycle state reset");
        epoch
    }

    /// Current session epoch
    pub fn epoch(&self) -> u64 {
        self.lock_state().epoch
    }

    /// Drop cooldown entries older than the window and expired highlights
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self, now: f64) -> usize {
        let cooldown = self.config.cooldown_s;
        let mut state = self.lock_state();
        let before = state.cooldowns.len() + state.highlights.len();

        state.cooldowns.retain(|_, last| now - *last < cooldown);
        state.highlights.retain(|_, until| now < *until);
        if state.focus.is_some_and(|(_, until)| now >= until) {
            state.focus = None;
        }

        before - (state.cooldowns.len() + state.highlights.len())
    }
}
