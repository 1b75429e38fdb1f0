//! # Dispatcher
//!
//! 告警生命周期与分发模块。
//!
//! 负责：
//! - 冷却去重、高亮/聚焦窗口 (`AlertManager`)
//! - 有界告警日志 (`AlertLog`)
//! - 违规证据落盘 (`FileEvidenceStore`)
//! - Fan-out 到多个 sinks，隔离慢订阅者，不阻塞处理线程

pub mod alert_log;
pub mod dispatcher;
pub mod error;
pub mod evidence;
pub mod handle;
pub mod lifecycle;
pub mod metrics;
pub mod sinks;

pub use alert_log::AlertLog;
pub use contracts::AlertSink;
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use evidence::{EvidenceRecord, FileEvidenceStore};
pub use handle::SinkHandle;
pub use lifecycle::{AlertManager, LifecycleConfig, DEFAULT_CHANNEL_CAPACITY};
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use sinks::{BroadcastSink, FileSink, FileSinkConfig, LogSink};
