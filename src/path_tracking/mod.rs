//! Path tracking: PID-steered trajectory following

pub mod tracker;
pub mod shared;
pub mod runner;

pub use tracker::*;
pub use shared::*;
pub use runner::*;
