//! Per-lane expected travel direction.
//!
//! A lane either carries a fixed unit vector from configuration or, when
//! auto-learning is enabled and no directions are configured, a robust
//! estimate recomputed from a rolling pool of observed unit motion vectors.
//!
//! The estimate is the componentwise median of the pool, renormalized. It is
//! recomputed every `update_interval_frames` once the warm-up has elapsed and
//! is never frozen: a lane keeps following the traffic it observes.

use std::fmt;

use contracts::LearningConfig;
use nalgebra::Vector2;
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, info};

use crate::geometry::{unit, PixelRoi};

/// Externally visible state of one lane's direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionPhase {
    /// Supplied by configuration, immutable
    Fixed,
    /// Collecting samples, no estimate yet
    Learning,
    /// Estimate available (may still be refined)
    Converged,
    /// No configured direction and no learning; wrong-way never fires
    Unset,
}

enum LaneState {
    Fixed(Vector2<f64>),
    Learned {
        pool: HeapRb<Vector2<f64>>,
        direction: Option<Vector2<f64>>,
    },
    Unset,
}

impl fmt::Debug for LaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneState::Fixed(d) => write!(f, "Fixed({:.3}, {:.3})", d.x, d.y),
            LaneState::Learned { pool, direction } => f
                .debug_struct("Learned")
                .field("samples", &pool.occupied_len())
                .field("direction", direction)
                .finish(),
            LaneState::Unset => write!(f, "Unset"),
        }
    }
}

/// Direction estimator for all lanes of a session
#[derive(Debug)]
pub struct DirectionEstimator {
    lanes: Vec<LaneState>,
    config: LearningConfig,
    warmup_frames: u64,
    learning: bool,
    learning_complete: bool,
}

impl DirectionEstimator {
    /// Build from the pixel ROI
    ///
    /// With `learn` set every lane starts in learning mode; otherwise lane `i`
    /// takes configured direction `i` when present and usable.
    pub fn new(roi: &PixelRoi, learn: bool, warmup_frames: u64, config: LearningConfig) -> Self {
        let lanes = (0..roi.lanes.len())
            .map(|i| {
                if learn {
                    LaneState::Learned {
                        pool: HeapRb::new(config.sample_capacity.max(1)),
                        direction: None,
                    }
                } else {
                    match roi.directions.get(i).copied().flatten() {
                        Some(d) => LaneState::Fixed(d),
                        None => LaneState::Unset,
                    }
                }
            })
            .collect();

        Self {
            lanes,
            config,
            warmup_frames,
            learning: learn,
            learning_complete: false,
        }
    }

    /// Current unit direction of `lane`, if any
    pub fn direction(&self, lane: usize) -> Option<Vector2<f64>> {
        match self.lanes.get(lane)? {
            LaneState::Fixed(d) => Some(*d),
            LaneState::Learned { direction, .. } => *direction,
            LaneState::Unset => None,
        }
    }

    pub fn phase(&self, lane: usize) -> Option<DirectionPhase> {
        Some(match self.lanes.get(lane)? {
            LaneState::Fixed(_) => DirectionPhase::Fixed,
            LaneState::Learned {
                direction: None, ..
            } => DirectionPhase::Learning,
            LaneState::Learned { .. } => DirectionPhase::Converged,
            LaneState::Unset => DirectionPhase::Unset,
        })
    }

    /// Number of pooled samples for `lane` (0 for non-learning lanes)
    pub fn sample_count(&self, lane: usize) -> usize {
        match self.lanes.get(lane) {
            Some(LaneState::Learned { pool, .. }) => pool.occupied_len(),
            _ => 0,
        }
    }

    /// Offer an observed velocity (px/s) for `lane`
    ///
    /// Accepted only in learning mode and above the speed floor; the pool keeps
    /// the unit vector. Returns whether the sample was pooled.
    pub fn offer(&mut self, lane: usize, velocity: Vector2<f64>) -> bool {
        if !self.learning || velocity.norm() < self.config.min_speed_pxps {
            return false;
        }
        let Some(LaneState::Learned { pool, .. }) = self.lanes.get_mut(lane) else {
            return false;
        };
        match unit(velocity) {
            Some(u) => {
                pool.push_overwrite(u);
                true
            }
            None => false,
        }
    }

    /// End-of-frame bookkeeping
    ///
    /// Recomputes estimates on update frames and flips `learning_complete`
    /// the first time every lane holds enough samples. Returns the lanes
    /// whose estimate changed.
    pub fn end_of_frame(&mut self, processed: u64) -> Vec<usize> {
        if !self.learning {
            return Vec::new();
        }

        let mut updated = Vec::new();
        let interval = self.config.update_interval_frames.max(1);
        if processed % interval == 0 && processed >= self.warmup_frames {
            for (idx, lane) in self.lanes.iter_mut().enumerate() {
                let LaneState::Learned { pool, direction } = lane else {
                    continue;
                };
                if pool.occupied_len() < self.config.min_samples {
                    continue;
                }
                match unit(componentwise_median(pool.iter())) {
                    Some(d) => {
                        debug!(lane = idx, x = d.x, y = d.y, "Lane direction re-estimated");
                        *direction = Some(d);
                        updated.push(idx);
                    }
                    // median collapsed to ~0, keep the previous estimate
                    None => debug!(lane = idx, "Degenerate median, keeping estimate"),
                }
            }
        }

        if !self.learning_complete && !self.lanes.is_empty() {
            let min = self.config.min_samples;
            if (0..self.lanes.len()).all(|i| self.sample_count(i) >= min) {
                self.learning_complete = true;
                info!(processed, "Auto lane direction learning complete");
            }
        }

        updated
    }

    /// Whether auto-learning is active for this session
    pub fn is_learning(&self) -> bool {
        self.learning
    }

    pub fn learning_complete(&self) -> bool {
        self.learning_complete
    }

    /// Warm-up progress in percent while learning is not complete
    pub fn progress(&self, processed: u64) -> Option<u8> {
        if !self.learning || self.learning_complete {
            return None;
        }
        if self.warmup_frames == 0 {
            return Some(100);
        }
        let pct = processed.saturating_mul(100) / self.warmup_frames;
        Some(pct.min(100) as u8)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

/// Componentwise median (even counts average the two middle values)
fn componentwise_median<'a>(samples: impl Iterator<Item = &'a Vector2<f64>>) -> Vector2<f64> {
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = samples.map(|v| (v.x, v.y)).unzip();
    Vector2::new(median(&mut xs), median(&mut ys))
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
