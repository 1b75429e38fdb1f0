//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Frame timestamps (seconds, f64) are the session clock for every rule,
//!   cooldown and highlight window
//! - `Frame::index` counts frames within a session and drives classifier cadence

mod alert;
mod blueprint;
mod collaborators;
mod engine_config;
mod error;
mod frame;
mod geometry;
mod metrics;
mod roi;
mod sink;

pub use alert::*;
pub use blueprint::*;
pub use collaborators::*;
pub use engine_config::*;
pub use error::*;
pub use frame::*;
pub use geometry::*;
pub use metrics::*;
pub use roi::*;
pub use sink::*;
