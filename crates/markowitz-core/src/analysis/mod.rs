//! End-to-end optimization runs: statistics, objective, frontier and
//! highlights in one call.

pub mod portfolio;

pub use portfolio::{
    optimize_portfolio, summarize, AssetWeight, Highlight, Objective, PortfolioOptimizationInput,
    PortfolioOptimizationOutput, PortfolioSummary, ValueRange,
};
