//! Dispatcher - fan-out of emitted alerts to subscriber sinks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{Alert, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{SinkMetrics, SinkMetricsSnapshot};
use crate::sinks::{BroadcastSink, FileSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: broadcast::Receiver<Alert>,
}

impl DispatcherBuilder {
    /// `input_rx` usually comes from `AlertManager::subscribe`
    pub fn new(config: DispatcherConfig, input_rx: broadcast::Receiver<Alert>) -> Self {
        Self { config, input_rx }
    }

    /// Build and start the sink workers
    ///
    /// Fails on duplicate sink names or when a sink cannot be created.
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut seen = HashSet::new();
        for sink in &self.config.sinks {
            if !seen.insert(sink.name.as_str()) {
                return Err(DispatcherError::DuplicateSink(sink.name.clone()));
            }
        }

        let mut handles = Vec::with_capacity(self.config.sinks.len());
        let mut viewers = HashMap::new();
        for sink_config in &self.config.sinks {
            let (handle, viewer) = create_sink_handle(sink_config)?;
            if let Some(tx) = viewer {
                viewers.insert(sink_config.name.clone(), tx);
            }
            handles.push(handle);
        }

        Ok(Dispatcher {
            handles,
            viewers,
            input_rx: self.input_rx,
        })
    }
}

/// Create a SinkHandle from configuration
///
/// Broadcast sinks also return their sender so viewers can subscribe later.
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(
    config: &SinkConfig,
) -> Result<(SinkHandle, Option<broadcast::Sender<Alert>>), DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok((SinkHandle::spawn(sink, config.queue_capacity), None))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok((SinkHandle::spawn(sink, config.queue_capacity), None))
        }
        SinkType::Broadcast => {
            let sink = BroadcastSink::new(&config.name, config.queue_capacity);
            let tx = sink.sender();
            Ok((SinkHandle::spawn(sink, config.queue_capacity), Some(tx)))
        }
    }
}

/// Fans alerts out to every sink
///
/// Each sink has its own bounded queue; a full queue drops the alert for
/// that sink only.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    viewers: HashMap<String, broadcast::Sender<Alert>>,
    input_rx: broadcast::Receiver<Alert>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: broadcast::Receiver<Alert>) -> Self {
        Self {
            handles,
            viewers: HashMap::new(),
            input_rx,
        }
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Live counters per sink, usable after the dispatcher is spawned
    pub fn metrics_handles(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Subscribe to a broadcast sink by name
    pub fn subscribe(&self, sink: &str) -> Option<broadcast::Receiver<Alert>> {
        self.viewers.get(sink).map(broadcast::Sender::subscribe)
    }

    /// Run the dispatcher main loop
    ///
    /// Returns when every alert sender is gone, after draining all sinks.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut alert_count: u64 = 0;

        loop {
            match self.input_rx.recv().await {
                Ok(alert) => {
                    alert_count += 1;
                    self.dispatch_alert(&alert);
                    if alert_count.is_multiple_of(100) {
                        debug!(alerts = alert_count, "Dispatcher progress");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    metrics::counter!("lanewatch_dispatcher_lagged_total").increment(skipped);
                    warn!(skipped, "Dispatcher lagged behind alert stream");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!(
            alerts = alert_count,
            "Dispatcher input closed, shutting down"
        );

        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    fn dispatch_alert(&self, alert: &Alert) {
        for handle in &self.handles {
            handle.try_send(alert.clone());
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: broadcast::Receiver<Alert>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build()
}
