//! Externally controlled signal state shared with the session worker

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use contracts::SignalState;
use tracing::{debug, warn};

const GREEN: u8 = 0;
const RED: u8 = 1;

/// Cloneable handle to the signal state
///
/// The worker reads it once per frame; writers never block the worker.
#[derive(Debug, Clone, Default)]
pub struct SignalControl(Arc<AtomicU8>);

impl SignalControl {
    pub fn new(initial: SignalState) -> Self {
        let control = Self::default();
        control.set(initial);
        control
    }

    pub fn get(&self) -> SignalState {
        match self.0.load(Ordering::Acquire) {
            RED => SignalState::Red,
            _ => SignalState::Green,
        }
    }

    pub fn set(&self, state: SignalState) {
        let raw = match state {
            SignalState::Red => RED,
            SignalState::Green => GREEN,
        };
        let previous = self.0.swap(raw, Ordering::AcqRel);
        if previous != raw {
            debug!(signal = ?state, "Signal state changed");
        }
    }

    /// Parse and apply; an unrecognized value leaves the state unchanged
    pub fn set_from_str(&self, value: &str) -> bool {
        match value.parse::<SignalState>() {
            Ok(state) => {
                self.set(state);
                true
            }
            Err(e) => {
                warn!(error = %e, "Ignoring signal update");
                false
            }
        }
    }
}
