//! Return statistics derived from date-aligned price histories.

pub mod statistics;

pub use statistics::{compute_return_statistics, PriceMatrix, PriceSeries, ReturnStatistics};
