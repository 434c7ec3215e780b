//! Mapping module
//!
//! Static occupancy maps used for clearance checks during planning.

pub mod occupancy_map;

pub use occupancy_map::*;
