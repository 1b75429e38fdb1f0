//! # Session
//!
//! 会话生命周期模块。
//!
//! 负责：
//! - 由调用方显式创建/启动/停止的会话 (无全局单例)
//! - 专用工作线程：读帧 → 检测跟踪 → 规则评估 → 告警 → 发布最新帧
//! - 有界等待停止，超时后仍释放视频源
//! - 查看端读取：告警日志、指标快照、最新帧、信号灯状态
//!
//! ## 使用示例
//!
//! ```ignore
//! use session::{Session, SessionSettings};
//!
//! let mut session = Session::from_blueprint(&blueprint)?;
//! session.start(|| open_source(), tracker, Classifiers::none())?;
//! session.set_signal_state("red");
//! let feed = session.recent_alerts();
//! session.stop();
//! ```

mod error;
mod published;
mod session;
mod signal;
mod worker;

pub use error::SessionError;
pub use published::{Annotation, PublishedFrame};
pub use session::{Session, SessionSettings};
pub use signal::SignalControl;
