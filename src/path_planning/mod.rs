// Path Planning module: RRT segments stitched through ordered waypoints

pub mod rrt;
pub mod waypoints;
pub mod stitcher;

pub use rrt::*;
pub use waypoints::*;
pub use stitcher::*;
