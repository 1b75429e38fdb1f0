//! # Rule Engine
//!
//! 逐帧违规规则评估引擎。
//!
//! 负责：
//! - ROI 几何 (归一化坐标 -> 像素，仅在会话首帧换算一次)
//! - 跟踪目标运动历史与逆行计数
//! - 车道行驶方向 (配置固定 / 中位数在线学习)
//! - 规则评估：闯红灯、逆行、越线、超速、未戴头盔、车牌识别
//!
//! 输出原始 `ViolationEvent`，去抖、取证与告警日志由 dispatcher 负责。
//!
//! ## 使用示例
//!
//! ```ignore
//! use rule_engine::{Classifiers, RuleEngine};
//!
//! let mut engine = RuleEngine::new(blueprint.roi.clone(), blueprint.engine.clone());
//! let mut classifiers = Classifiers::none();
//!
//! while let Some(frame) = source.read_frame() {
//!     let objects = tracker.track(&frame)?;
//!     let evaluation = engine.evaluate(&frame, &objects, signal, &mut classifiers);
//!     for event in evaluation.events {
//!         // hand over to the alert manager
//!     }
//! }
//! ```

mod classifiers;
mod direction;
mod engine;
pub mod geometry;
mod history;

// Re-exports
pub use classifiers::Classifiers;
pub use direction::{DirectionEstimator, DirectionPhase};
pub use engine::{FrameEvaluation, RuleEngine, TrackObservation, RIDER_CLASSES};
pub use geometry::{line_crossed, meters_per_pixel, point_in_zone, PixelRoi};
pub use history::{MotionHistory, TrackState, TrackTable};

pub use nalgebra::Vector2;
