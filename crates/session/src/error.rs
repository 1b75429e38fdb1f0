//! Session error types

use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

/// Session-level errors
///
/// Only session start can fail; a running session never surfaces errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Frame source could not be opened; no worker was started
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[source] ContractError),

    /// Evidence store setup failed
    #[error("evidence store: {0}")]
    Evidence(#[from] DispatcherError),

    /// Worker thread could not be spawned
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[from] std::io::Error),
}
