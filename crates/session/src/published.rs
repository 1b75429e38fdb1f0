//! Latest annotated frame handed to the presentation layer

use contracts::{BBox, Frame, SignalState};

/// Per-object render data for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub track_id: Option<u64>,
    pub class_name: String,
    pub bbox: BBox,
    pub lane: Option<usize>,
    /// Rule labels fired this frame, in evaluation order
    pub labels: Vec<String>,
    /// Inside its highlight window
    pub highlighted: bool,
}

/// Snapshot published after every processed frame
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    pub frame: Frame,
    pub signal: SignalState,
    pub annotations: Vec<Annotation>,
    /// Track currently in focus (wrong-way)
    pub focus: Option<u64>,
    /// `0..=100` while lane directions are still being learned
    pub learning_progress: Option<u8>,
    pub learning_complete: bool,
}

impl PublishedFrame {
    pub fn annotation(&self, track_id: u64) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.track_id == Some(track_id))
    }
}
