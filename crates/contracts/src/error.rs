//! Layered error definitions
//!
//! Categorized by source: config / source / collaborator / evidence / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Frame Source Errors =====
    /// Capture device or file cannot be opened
    #[error("source '{source_id}' unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },

    /// Malformed record inside a frame source
    #[error("payload parse error for source '{source_id}': {message}")]
    PayloadParse { source_id: String, message: String },

    // ===== Collaborator Errors =====
    /// Detector, tracker or classifier failure
    #[error("collaborator '{name}' failed: {message}")]
    Collaborator { name: String, message: String },

    /// Evidence capture failure
    #[error("evidence capture failed: {message}")]
    Evidence { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source unavailable error
    pub fn source_unavailable(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create collaborator error
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create evidence error
    pub fn evidence(message: impl Into<String>) -> Self {
        Self::Evidence {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
