use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::FrontierAxis;

#[derive(Debug, Error)]
pub enum MarkowitzError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Infeasible target: {axis} {requested} is outside the achievable range [{min}, {max}]")]
    InfeasibleTarget {
        axis: FrontierAxis,
        requested: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Solver did not converge: {function} stopped after {iterations} iterations (delta: {last_delta})")]
    SolverNonConvergence {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MarkowitzError {
    /// Short, user-facing advice for the error kind.
    ///
    /// Ranges are rendered as percentages because that is how the surrounding
    /// tools present returns and risk.
    pub fn hint(&self) -> Option<String> {
        match self {
            MarkowitzError::InsufficientData(_) => Some(
                "price data unavailable: supply at least 2 assets with 2 or more aligned observations"
                    .into(),
            ),
            MarkowitzError::DegenerateInput(_) => Some(
                "remove duplicate or constant-price assets and try again".into(),
            ),
            MarkowitzError::InfeasibleTarget { axis, min, max, .. } => Some(format!(
                "target {} unreachable: choose a {} between {}% and {}%",
                axis,
                axis,
                as_percent(*min),
                as_percent(*max)
            )),
            MarkowitzError::SolverNonConvergence { .. } => Some(
                "increase solver.max_iterations or loosen solver.tolerance".into(),
            ),
            MarkowitzError::InvalidInput { .. } | MarkowitzError::SerializationError(_) => None,
        }
    }

    /// Error message followed by the hint, when there is one. Used where only
    /// a single string crosses the boundary.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{} (hint: {})", self, hint),
            None => self.to_string(),
        }
    }
}

fn as_percent(value: Decimal) -> Decimal {
    (value * Decimal::ONE_HUNDRED).round_dp(3)
}

impl From<serde_json::Error> for MarkowitzError {
    fn from(e: serde_json::Error) -> Self {
        MarkowitzError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_infeasible_hint_uses_percentages() {
        let err = MarkowitzError::InfeasibleTarget {
            axis: FrontierAxis::Return,
            requested: dec!(0.05),
            min: dec!(0.0012345),
            max: dec!(0.02),
        };
        let hint = err.hint().unwrap();
        assert!(hint.contains("0.123%"), "{}", hint);
        assert!(hint.contains("2.000%") || hint.contains("2.00%") || hint.contains("2%"), "{}", hint);
        assert!(err.to_string().contains("return 0.05"));
    }

    #[test]
    fn test_invalid_input_has_no_hint() {
        let err = MarkowitzError::InvalidInput {
            field: "prices".into(),
            reason: "empty".into(),
        };
        assert!(err.hint().is_none());
        assert_eq!(err.with_hint(), "Invalid input: prices: empty");
    }

    #[test]
    fn test_with_hint_appends_advice() {
        let err = MarkowitzError::InfeasibleTarget {
            axis: FrontierAxis::Risk,
            requested: dec!(0.5),
            min: dec!(0.01),
            max: dec!(0.05),
        };
        let message = err.with_hint();
        assert!(message.starts_with("Infeasible target: risk 0.5"), "{}", message);
        assert!(message.contains("(hint: target risk unreachable: choose a risk between"), "{}", message);
    }
}
