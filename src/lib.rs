//! Xidi core
//!
//! DirectInput-style virtual controllers on top of XInput gamepads: the mapping language, the
//! element mapper tree, per-axis properties, buffered state-change events and force feedback.

pub mod config;
pub mod controller;
pub mod force_feedback;
pub mod parser;
pub mod paths;
pub mod physical;

pub use config::AppConfig;
pub use controller::{Mapper, MapperRegistry, VirtualController};
pub use force_feedback::ForceFeedbackHub;
