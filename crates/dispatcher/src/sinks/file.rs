//! FileSink - appends alerts to a JSON Lines file

use contracts::{Alert, AlertSink, ContractError};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, one JSON object per line
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("alerts.jsonl"));

        Self { path }
    }
}

/// Sink that appends alerts to a JSONL file
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Open (or create) the output file in append mode
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    fn append(&mut self, alert: &Alert) -> std::io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("sink closed"))?;
        serde_json::to_writer(&mut *writer, alert)?;
        writer.write_all(b"\n")
    }
}

impl AlertSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, alert),
        fields(sink = %self.name, kind = %alert.kind)
    )]
    async fn write(&mut self, alert: &Alert) -> Result<(), ContractError> {
        self.append(alert).map_err(|e| {
            error!(sink = %self.name, path = %self.path.display(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertInfo, ViolationKind};
    use tempfile::tempdir;

    fn make_alert(track_id: u64) -> Alert {
        Alert {
            ts: track_id as f64,
            kind: ViolationKind::WrongWay,
            track_id: Some(track_id),
            info: AlertInfo::new(),
            vehicle_class: None,
            evidence_id: None,
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/alerts.jsonl");

        let mut sink = FileSink::new("test_file", FileSinkConfig { path: path.clone() }).unwrap();
        sink.write(&make_alert(1)).await.unwrap();
        sink.write(&make_alert(2)).await.unwrap();
        sink.close().await.unwrap();

        let mut sink = FileSink::new("test_file", FileSinkConfig { path: path.clone() }).unwrap();
        sink.write(&make_alert(3)).await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let alerts: Vec<Alert> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[2].track_id, Some(3));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let config = FileSinkConfig {
            path: dir.path().join("alerts.jsonl"),
        };
        let mut sink = FileSink::new("closed", config).unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(&make_alert(1)).await.is_err());
    }

    #[test]
    fn test_config_default_path() {
        let config = FileSinkConfig::from_params(&HashMap::new());
        assert_eq!(config.path, PathBuf::from("alerts.jsonl"));
    }
}
