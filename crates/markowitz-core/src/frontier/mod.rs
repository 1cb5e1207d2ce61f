//! Efficient-frontier sampling and nearest-point lookup.

pub mod generator;
pub mod locator;

#[cfg(feature = "parallel")]
pub use generator::generate_frontier_parallel;
pub use generator::{generate_frontier, FrontierCurve, FrontierPoint, FrontierSweep, SweepRange};
pub use locator::{locate_nearest, NearestMatch};
