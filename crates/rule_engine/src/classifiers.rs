//! Optional classifier capabilities, resolved once per session.
//!
//! Absence is a plain "skip this rule" branch. A classifier error is logged,
//! counted and treated as "no finding" for this frame.

use contracts::{BBox, Frame, HelmetClassifier, PlateReader};
use observability::record_collaborator_failure;
use tracing::debug;

/// Optional plate reader and helmet classifier
#[derive(Default)]
pub struct Classifiers {
    plate: Option<Box<dyn PlateReader>>,
    helmet: Option<Box<dyn HelmetClassifier>>,
}

impl std::fmt::Debug for Classifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifiers")
            .field("plate", &self.plate.is_some())
            .field("helmet", &self.helmet.is_some())
            .finish()
    }
}

impl Classifiers {
    /// No classifiers: helmet and plate rules are skipped
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_plate_reader(mut self, reader: Box<dyn PlateReader>) -> Self {
        self.plate = Some(reader);
        self
    }

    pub fn with_helmet_classifier(mut self, classifier: Box<dyn HelmetClassifier>) -> Self {
        self.helmet = Some(classifier);
        self
    }

    pub fn has_plate_reader(&self) -> bool {
        self.plate.is_some()
    }

    pub fn has_helmet_classifier(&self) -> bool {
        self.helmet.is_some()
    }

    /// Plate text for the box, `None` when absent, illegible or failed
    pub fn read_plate(&mut self, frame: &Frame, bbox: &BBox) -> Option<String> {
        let reader = self.plate.as_mut()?;
        match reader.read_plate(frame, bbox) {
            Ok(text) => text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(error = %e, "Plate reader failed");
                record_collaborator_failure("plate_reader");
                None
            }
        }
    }

    /// Whether the head region shows a rider without a helmet
    pub fn no_helmet(&mut self, frame: &Frame, head: &BBox) -> bool {
        let Some(classifier) = self.helmet.as_mut() else {
            return false;
        };
        if head.width() <= 0.0 || head.height() <= 0.0 {
            return false;
        }
        classifier.detect_no_helmet(frame, head).unwrap_or_else(|e| {
            debug!(error = %e, "Helmet classifier failed");
            record_collaborator_failure("helmet_classifier");
            false
        })
    }
}
