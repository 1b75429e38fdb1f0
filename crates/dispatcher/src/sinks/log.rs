//! LogSink - logs each alert via tracing

use contracts::{Alert, AlertSink, ContractError};
use tracing::{info, instrument};

/// Sink that logs one line per alert
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, alert),
        fields(sink = %self.name, kind = %alert.kind)
    )]
    async fn write(&mut self, alert: &Alert) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            ts = alert.ts,
            kind = %alert.kind,
            track_id = ?alert.track_id,
            vehicle_class = alert.vehicle_class.as_deref().unwrap_or("-"),
            evidence_id = alert.evidence_id.as_deref().unwrap_or("-"),
            info = %serde_json::Value::Object(alert.info.clone()),
            "Alert"
        );
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertInfo, ViolationKind};

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let alert = Alert {
            ts: 1.0,
            kind: ViolationKind::SignalCrossing,
            track_id: Some(3),
            info: AlertInfo::new(),
            vehicle_class: Some("car".into()),
            evidence_id: None,
        };

        assert!(sink.write(&alert).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
