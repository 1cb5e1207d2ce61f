use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns, risks and weights expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Coordinate of a risk/return chart a scalar refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierAxis {
    /// Expected portfolio return (vertical axis).
    Return,
    /// Portfolio standard deviation (horizontal axis).
    Risk,
}

impl fmt::Display for FrontierAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontierAxis::Return => write!(f, "return"),
            FrontierAxis::Risk => write!(f, "risk"),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
    /// Number of quadratic programs solved to produce the result.
    pub solver_calls: u32,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    solver_calls: u32,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
            solver_calls,
        },
    }
}
