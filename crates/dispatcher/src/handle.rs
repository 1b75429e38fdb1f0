//! SinkHandle - one alert subscriber behind its own bounded queue and worker task
//!
//! A slow or failing subscriber only ever loses its own alerts.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{Alert, AlertSink};
use observability::record_alert_dispatched;

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Alert>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl SinkHandle {
    /// Spawn the worker task for `sink`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: AlertSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an alert without waiting
    ///
    /// Returns false when the queue is full (alert dropped for this sink only)
    /// or the worker is gone.
    pub fn try_send(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(alert)) => {
                self.metrics.inc_dropped();
                metrics::counter!("lanewatch_subscriber_drops_total", "sink" => self.name.clone())
                    .increment(1);
                warn!(
                    sink = %self.name,
                    kind = %alert.kind,
                    track_id = ?alert.track_id,
                    "Queue full, alert dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue, drain it and wait for the worker
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: AlertSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Alert>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(alert) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&alert).await {
            Ok(()) => {
                metrics.inc_delivered();
                record_alert_dispatched(&name, true);
            }
            Err(e) => {
                metrics.inc_failed();
                record_alert_dispatched(&name, false);
                error!(
                    sink = %name,
                    kind = %alert.kind,
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
