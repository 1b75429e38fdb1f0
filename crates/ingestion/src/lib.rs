//! # Ingestion
//!
//! 帧源模块。
//!
//! 负责：
//! - JSONL 场景回放：拆分为 `FrameSource` 与 `DetectorTracker`
//! - 回放行中的信号灯状态通过回调交给会话
//! - 脚本化 Mock 场景 (测试/演示)
//!
//! ## 使用示例
//!
//! ```ignore
//! use ingestion::ReplayLog;
//!
//! let (source, tracker) = ReplayLog::load("scene.jsonl")?.split();
//! let source = source.with_signal_hook(move |state| signal.set(state));
//! ```

mod error;
mod mock;
mod replay;

pub use error::{IngestionError, Result};
pub use mock::{MockScene, ScriptedTrack};
pub use replay::{ReplayLog, ReplayRecord, ReplaySource, ReplayTracker, SignalHook};
