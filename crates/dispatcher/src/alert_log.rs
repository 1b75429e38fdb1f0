//! Bounded alert log.
//!
//! Fixed capacity ring buffer; the oldest alert is overwritten on overflow.
//! Readers receive a value snapshot, most recent first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::Alert;
use ringbuf::{traits::*, HeapRb};

/// Most-recent-first alert log with oldest-first eviction
pub struct AlertLog {
    entries: Mutex<HeapRb<Alert>>,
    capacity: usize,
}

impl std::fmt::Debug for AlertLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(HeapRb::new(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeapRb<Alert>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&self, alert: Alert) {
        self.lock().push_overwrite(alert);
    }

    /// Copy of the log, most recent first
    pub fn snapshot(&self) -> Vec<Alert> {
        let entries = self.lock();
        let mut alerts: Vec<Alert> = entries.iter().cloned().collect();
        drop(entries);
        alerts.reverse();
        alerts
    }

    pub fn len(&self) -> usize {
        self.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertInfo, ViolationKind};

    fn make_alert(ts: f64) -> Alert {
        Alert {
            ts,
            kind: ViolationKind::Speeding,
            track_id: Some(1),
            info: AlertInfo::new(),
            vehicle_class: None,
            evidence_id: None,
        }
    }

    #[test]
    fn test_most_recent_first() {
        let log = AlertLog::new(10);
        for i in 0..3 {
            log.push(make_alert(i as f64));
        }
        let ts: Vec<f64> = log.snapshot().iter().map(|a| a.ts).collect();
        assert_eq!(ts, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = AlertLog::new(200);
        for i in 0..1000 {
            log.push(make_alert(i as f64));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 200);
        assert_eq!(snapshot[0].ts, 999.0);
        assert_eq!(snapshot[199].ts, 800.0);

        log.clear();
        assert!(log.is_empty());
    }
}
