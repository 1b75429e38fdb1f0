//! BroadcastSink - in-process fan-out for live viewers
//!
//! Viewers that fall behind lose the oldest alerts (`RecvError::Lagged`);
//! the sink itself never blocks.

use contracts::{Alert, AlertSink, ContractError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub struct BroadcastSink {
    name: String,
    tx: broadcast::Sender<Alert>,
}

impl BroadcastSink {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Sender handle, used to subscribe after the sink moved into its worker
    pub fn sender(&self) -> broadcast::Sender<Alert> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl AlertSink for BroadcastSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, alert: &Alert) -> Result<(), ContractError> {
        // No viewers is not an error
        if let Ok(viewers) = self.tx.send(alert.clone()) {
            trace!(sink = %self.name, viewers, "Alert broadcast");
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "BroadcastSink closed");
        Ok(())
    }
}
