//! Engine configuration.
//!
//! Every field has a default so a partial JSON document (or none at all) is a
//! valid configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::MarkowitzError;
use crate::optimizer::WeightBoundsPolicy;
use crate::MarkowitzResult;

/// Convergence controls shared by every solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Step, multiplier and constraint tolerance.
    pub tolerance: Decimal,
    /// Cap on active-set iterations per solve (and on bisection steps for
    /// risk-budget solves).
    pub max_iterations: u32,
    /// Relative pivot below which the covariance matrix is treated as singular.
    pub singularity_tolerance: Decimal,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.0000000001),
            max_iterations: 500,
            singularity_tolerance: dec!(0.0000000001),
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> MarkowitzResult<()> {
        if self.tolerance <= Decimal::ZERO || self.tolerance >= dec!(0.01) {
            return Err(MarkowitzError::InvalidInput {
                field: "solver.tolerance".into(),
                reason: format!("must be in (0, 0.01), got {}", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(MarkowitzError::InvalidInput {
                field: "solver.max_iterations".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.singularity_tolerance <= Decimal::ZERO || self.singularity_tolerance >= Decimal::ONE
        {
            return Err(MarkowitzError::InvalidInput {
                field: "solver.singularity_tolerance".into(),
                reason: format!("must be in (0, 1), got {}", self.singularity_tolerance),
            });
        }
        Ok(())
    }
}

/// Number of target returns sampled per frontier sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// Points for a sweep over `[min asset mean, max asset mean]`.
    pub full_sweep_points: usize,
    /// Points for a sweep starting at the minimum-variance return.
    pub restricted_sweep_points: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            full_sweep_points: 75,
            restricted_sweep_points: 60,
        }
    }
}

impl FrontierConfig {
    pub fn validate(&self) -> MarkowitzResult<()> {
        for (field, value) in [
            ("frontier.full_sweep_points", self.full_sweep_points),
            ("frontier.restricted_sweep_points", self.restricted_sweep_points),
        ] {
            if value < 2 {
                return Err(MarkowitzError::InvalidInput {
                    field: field.into(),
                    reason: format!("a frontier needs at least 2 points, got {}", value),
                });
            }
        }
        Ok(())
    }
}

/// Top-level configuration consumed by the CLI and bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bounds: WeightBoundsPolicy,
    pub solver: SolverSettings,
    pub frontier: FrontierConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> MarkowitzResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MarkowitzResult<()> {
        self.solver.validate()?;
        self.frontier.validate()?;
        if let WeightBoundsPolicy::ShortSelling { lower, upper } = self.bounds {
            if lower >= upper {
                return Err(MarkowitzError::InvalidInput {
                    field: "bounds".into(),
                    reason: format!("lower bound {} must be below upper bound {}", lower, upper),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.frontier.full_sweep_points, 75);
        assert_eq!(config.frontier.restricted_sweep_points, 60);
        assert_eq!(config.bounds, WeightBoundsPolicy::NoShortSelling);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "bounds": {"type": "short_selling", "lower": "-0.5", "upper": "1.5"},
            "solver": {"max_iterations": 50},
            "frontier": {"full_sweep_points": 20}
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.bounds,
            WeightBoundsPolicy::ShortSelling {
                lower: dec!(-0.5),
                upper: dec!(1.5)
            }
        );
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.solver.tolerance, dec!(0.0000000001));
        assert_eq!(config.frontier.full_sweep_points, 20);
        assert_eq!(config.frontier.restricted_sweep_points, 60);
    }

    #[test]
    fn test_rejects_single_point_frontier() {
        let json = r#"{"frontier": {"restricted_sweep_points": 1}}"#;
        let err = EngineConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, MarkowitzError::InvalidInput { .. }));
    }

    #[test]
    fn test_rejects_zero_tolerance() {
        let settings = SolverSettings {
            tolerance: Decimal::ZERO,
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, MarkowitzError::SerializationError(_)));
    }
}
