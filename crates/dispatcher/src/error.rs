//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Duplicate sink name
    #[error("duplicate sink name '{0}'")]
    DuplicateSink(String),

    /// Evidence store setup error
    #[error("evidence store unavailable at '{path}': {message}")]
    EvidenceStore { path: String, message: String },

    /// Error from contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an evidence store error
    pub fn evidence_store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvidenceStore {
            path: path.into(),
            message: message.into(),
        }
    }
}
