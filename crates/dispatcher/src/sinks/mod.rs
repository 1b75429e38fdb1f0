//! Sink implementations
//!
//! Contains LogSink, FileSink, and BroadcastSink.

mod broadcast;
mod file;
mod log;

pub use self::broadcast::BroadcastSink;
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
