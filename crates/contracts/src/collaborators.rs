//! External collaborator traits
//!
//! Defines the seams between the rule engine and everything it does not own:
//! frame capture, detection + tracking, optional classifiers and evidence
//! persistence.
//!
//! # Design Principles
//!
//! 1. **Synchronous**: all calls happen on the single session worker thread
//! 2. **Fallible by contract**: a collaborator error never aborts a session;
//!    callers treat it as "no result for this frame"
//! 3. **Optional capabilities**: classifiers are resolved once at session start
//!    and absence is a defined "skip this rule" branch
//!
//! # Example
//!
//! ```ignore
//! let mut source: Box<dyn FrameSource> = open_source()?;
//! while let Some(frame) = source.read_frame() {
//!     let objects = tracker.track(&frame).unwrap_or_default();
//!     // ... evaluate rules ...
//! }
//! source.release();
//! ```

use crate::{AlertInfo, BBox, ContractError, Frame, TrackedObject, ViolationKind};

/// Frame source (camera, video file, replay)
///
/// Opening happens when the source is constructed; an open failure is a
/// [`ContractError::SourceUnavailable`] surfaced before any worker starts.
pub trait FrameSource: Send {
    /// Source identifier (used for logging)
    fn source_id(&self) -> &str;

    /// Nominal frame rate reported by the source, if known
    fn nominal_fps(&self) -> Option<f64>;

    /// Read the next frame
    ///
    /// `None` means end of stream; the session stops itself.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Release the underlying capture resource
    ///
    /// Must be idempotent: it may run after a timed-out worker join.
    fn release(&mut self);
}

/// External detector + multi-object tracker
pub trait DetectorTracker: Send {
    /// Tracked objects for one frame
    ///
    /// Track ids are trusted to be stable across frames within a session.
    fn track(&mut self, frame: &Frame) -> Result<Vec<TrackedObject>, ContractError>;
}

/// Evidence persistence (crop, full frame, metadata)
pub trait EvidenceStore: Send + Sync {
    /// Persist evidence for one violation and return its identifier
    ///
    /// # Errors
    /// Any failure (including an empty crop); the alert proceeds without
    /// an evidence reference.
    fn save_violation(
        &self,
        kind: ViolationKind,
        track_id: Option<u64>,
        frame: &Frame,
        bbox: &BBox,
        info: &AlertInfo,
    ) -> Result<String, ContractError>;
}

/// Optional plate reader (OCR)
pub trait PlateReader: Send {
    /// Plate text inside `bbox`, `None` when nothing legible was found
    fn read_plate(&mut self, frame: &Frame, bbox: &BBox) -> Result<Option<String>, ContractError>;
}

/// Optional helmet classifier
pub trait HelmetClassifier: Send {
    /// Whether the head region shows a rider without a helmet
    fn detect_no_helmet(&mut self, frame: &Frame, head: &BBox) -> Result<bool, ContractError>;
}
