//! Session orchestration module.

mod limit;
mod orchestrator;
mod stats;

pub use limit::FrameLimit;
pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::RunSummary;
