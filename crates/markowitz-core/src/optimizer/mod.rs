//! Mean-variance optimization under a budget constraint and per-weight bounds.

mod active_set;
pub mod bounds;
pub mod mean_variance;

pub use bounds::WeightBoundsPolicy;
pub use mean_variance::{OptimizationResult, OptimizerCore};
