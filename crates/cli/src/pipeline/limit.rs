//! Frame-count cap around any frame source.

use contracts::{Frame, FrameSource};

/// Ends the stream after `remaining` frames
pub struct FrameLimit {
    inner: Box<dyn FrameSource>,
    remaining: u64,
}

impl FrameLimit {
    pub fn new(inner: Box<dyn FrameSource>, max_frames: u64) -> Self {
        Self {
            inner,
            remaining: max_frames,
        }
    }
}

impl FrameSource for FrameLimit {
    fn source_id(&self) -> &str {
        self.inner.source_id()
    }

    fn nominal_fps(&self) -> Option<f64> {
        self.inner.nominal_fps()
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.inner.read_frame()
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::MockScene;

    #[test]
    fn test_limit_ends_stream() {
        let (source, _) = MockScene::new(32, 32, 10.0, 10).to_log().split();
        let mut limited = FrameLimit::new(Box::new(source), 3);

        let mut count = 0;
        while limited.read_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(limited.source_id(), "mock_scene");
    }
}
