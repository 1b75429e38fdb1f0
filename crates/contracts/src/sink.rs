//! AlertSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for alert subscribers.

use crate::{Alert, ContractError};

/// Alert output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(AlertSink: Send)]
pub trait LocalAlertSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one alert
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, alert: &Alert) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
