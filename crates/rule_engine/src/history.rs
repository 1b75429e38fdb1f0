//! Per-track motion state.
//!
//! Bounded position history (HeapRb, oldest overwritten), wrong-way counter,
//! last position for speed estimation and the plate read for the track.
//! Tracks idle for longer than the configured timeout are evicted.

use std::collections::HashMap;
use std::fmt;

use contracts::Point;
use nalgebra::Vector2;
use ringbuf::{traits::*, HeapRb};

use crate::geometry::to_vector;

/// Fixed-capacity, time-ordered (timestamp, centroid) samples
pub struct MotionHistory {
    samples: HeapRb<(f64, Point)>,
}

impl fmt::Debug for MotionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionHistory")
            .field("len", &self.samples.occupied_len())
            .field("capacity", &self.samples.capacity())
            .finish()
    }
}

impl MotionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: HeapRb::new(capacity.max(2)),
        }
    }

    /// Append a sample, overwriting the oldest when full
    #[inline]
    pub fn push(&mut self, timestamp: f64, centroid: Point) {
        self.samples.push_overwrite((timestamp, centroid));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average velocity (px/s) from the oldest to the newest sample
    ///
    /// `None` until at least `min_samples` samples span more than `min_span_s`.
    pub fn velocity(&self, min_samples: usize, min_span_s: f64) -> Option<Vector2<f64>> {
        if self.len() < min_samples.max(2) {
            return None;
        }

        let (t0, p0) = *self.samples.iter().next()?;
        let (t1, p1) = *self.samples.iter().last()?;

        let dt = t1 - t0;
        if dt <= min_span_s {
            return None;
        }
        Some((to_vector(p1) - to_vector(p0)) / dt)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Mutable state of one tracked object
#[derive(Debug)]
pub struct TrackState {
    /// Lane samples, only appended while the centroid is inside a lane
    pub history: MotionHistory,
    /// Consecutive frames of opposite-direction motion
    pub wrong_way_count: u32,
    /// Previous (timestamp, centroid), any frame
    pub last_position: Option<(f64, Point)>,
    /// Session time of the latest observation
    pub last_seen: f64,
    pub plate: Option<String>,
}

impl TrackState {
    fn new(history_capacity: usize, now: f64) -> Self {
        Self {
            history: MotionHistory::new(history_capacity),
            wrong_way_count: 0,
            last_position: None,
            last_seen: now,
            plate: None,
        }
    }
}

/// Track id -> state, with idle eviction
#[derive(Debug)]
pub struct TrackTable {
    tracks: HashMap<u64, TrackState>,
    history_capacity: usize,
}

impl TrackTable {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            history_capacity,
        }
    }

    /// State for `track_id`, created on first sight
    ///
    /// Returns `true` as second element when the track is new.
    pub fn get_or_insert(&mut self, track_id: u64, now: f64) -> (&mut TrackState, bool) {
        let capacity = self.history_capacity;
        let mut is_new = false;
        let state = self.tracks.entry(track_id).or_insert_with(|| {
            is_new = true;
            TrackState::new(capacity, now)
        });
        state.last_seen = now;
        (state, is_new)
    }

    pub fn get(&self, track_id: u64) -> Option<&TrackState> {
        self.tracks.get(&track_id)
    }

    /// Drop tracks not seen for more than `timeout_s`, returning how many
    pub fn evict_idle(&mut self, now: f64, timeout_s: f64) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|_, state| now - state.last_seen <= timeout_s);
        before - self.tracks.len()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
