//! Control algorithms module
//!
//! Steering control for trajectory tracking.

pub mod pid;

pub use pid::*;
