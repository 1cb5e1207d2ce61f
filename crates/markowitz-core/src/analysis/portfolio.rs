use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::MarkowitzError;
use crate::frontier::{locate_nearest, FrontierCurve, NearestMatch, SweepRange};
use crate::linalg::mat_vec_multiply;
use crate::optimizer::{OptimizationResult, OptimizerCore};
use crate::returns::{compute_return_statistics, PriceMatrix, ReturnStatistics};
use crate::types::{with_metadata, ComputationOutput, FrontierAxis, Rate};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the optimal portfolio of a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Objective {
    /// Global minimum variance, shown against the full-range frontier.
    #[default]
    MinimumVariance,
    /// Least risk for an expected return on the efficient branch.
    TargetReturn { target: Rate },
    /// Most return for a risk budget (risk tolerance).
    RiskBudget { risk: Rate },
}

/// Extra value to mark on the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub axis: FrontierAxis,
    pub value: Rate,
}

/// Input to a full optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOptimizationInput {
    pub prices: PriceMatrix,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub config: EngineConfig,
    /// Additional frontier highlights beyond the objective's own.
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

/// A single asset weight with risk/return contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetWeight {
    pub name: String,
    pub weight: Rate,
    /// Weight times marginal risk; sums to portfolio risk.
    pub contribution_to_risk: Rate,
    /// Weight times mean return.
    pub contribution_to_return: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub weights: Vec<AssetWeight>,
    pub expected_return: Rate,
    pub risk: Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Rate,
    pub max: Rate,
}

/// Output of a full optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOptimizationOutput {
    pub asset_names: Vec<String>,
    pub mean_returns: Vec<Rate>,
    pub volatilities: Vec<Rate>,
    pub min_variance_portfolio: PortfolioSummary,
    pub optimal_portfolio: PortfolioSummary,
    /// Returns any feasible portfolio can earn.
    pub achievable_return_range: ValueRange,
    /// Returns on the efficient branch (target-return inputs must lie here).
    pub efficient_return_range: ValueRange,
    /// Risk budgets with a solution.
    pub achievable_risk_range: ValueRange,
    pub frontier: FrontierCurve,
    pub highlighted_points: Vec<NearestMatch>,
    /// Weighted average volatility / portfolio volatility.
    pub diversification_ratio: Decimal,
    /// Herfindahl-Hirschman index of weights.
    pub hhi_concentration: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a complete optimization: statistics, the minimum-variance portfolio,
/// the portfolio for the chosen objective, a frontier sweep and highlights.
pub fn optimize_portfolio(
    input: &PortfolioOptimizationInput,
) -> MarkowitzResult<ComputationOutput<PortfolioOptimizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let config = &input.config;
    config.validate()?;

    let stats = compute_return_statistics(&input.prices)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver)?;
    let n = stats.num_assets();
    let tol = config.solver.tolerance;

    // --- Minimum variance portfolio ---
    let min_variance = core.minimize_variance()?;
    let mut solver_calls = min_variance.solves;

    // --- Ranges ---
    let (ach_lo, ach_hi) = core.achievable_return_range();
    let (eff_lo, eff_hi) = core.efficient_return_range(&min_variance);
    let (risk_lo, risk_hi, top) = core.achievable_risk_range(&min_variance)?;
    solver_calls += top.solves;

    // --- Objective ---
    let restricted = SweepRange::FromMinimumVariance {
        min_variance_return: min_variance.expected_return,
    };
    let mut highlights: Vec<Highlight> = Vec::new();
    let (optimal, range) = match input.objective {
        Objective::MinimumVariance => (min_variance.clone(), SweepRange::Full),
        Objective::TargetReturn { target } => {
            if target < eff_lo - tol || target > eff_hi + tol {
                return Err(MarkowitzError::InfeasibleTarget {
                    axis: FrontierAxis::Return,
                    requested: target,
                    min: eff_lo,
                    max: eff_hi,
                });
            }
            highlights.push(Highlight {
                axis: FrontierAxis::Return,
                value: target,
            });
            let res = core.minimize_variance_for_target_return(target)?;
            solver_calls += res.solves;
            (res, restricted)
        }
        Objective::RiskBudget { risk } => {
            highlights.push(Highlight {
                axis: FrontierAxis::Risk,
                value: risk,
            });
            let res = core.maximize_return_for_risk_budget(risk, &min_variance)?;
            solver_calls += res.solves;
            (res, restricted)
        }
    };
    highlights.extend(input.highlights.iter().copied());

    // --- Frontier ---
    let frontier = build_frontier(&core, config, range)?;
    solver_calls += frontier.len() as u32;

    let mut highlighted_points = Vec::with_capacity(highlights.len());
    for h in &highlights {
        match locate_nearest(&frontier, h.value, h.axis) {
            Ok(m) => highlighted_points.push(m),
            Err(MarkowitzError::InfeasibleTarget { min, max, .. }) => warnings.push(format!(
                "Highlight {} {} lies outside the sampled frontier [{}, {}]",
                h.axis,
                h.value.round_dp(6),
                min.round_dp(6),
                max.round_dp(6)
            )),
            Err(e) => return Err(e),
        }
    }

    // --- Summaries ---
    let min_variance_portfolio = summarize(&stats, &min_variance);
    let optimal_portfolio = summarize(&stats, &optimal);

    let weighted_avg_vol: Decimal = optimal
        .weights
        .iter()
        .zip(stats.volatilities.iter())
        .map(|(w, v)| *w * *v)
        .sum();
    let diversification_ratio = if optimal.risk.is_zero() {
        Decimal::ONE
    } else {
        weighted_avg_vol / optimal.risk
    };
    let hhi_concentration: Decimal = optimal.weights.iter().map(|w| *w * *w).sum();

    // --- Warnings ---
    for aw in &optimal_portfolio.weights {
        if aw.weight > dec!(0.40) {
            warnings.push(format!(
                "Concentrated position: {} has weight {:.4}",
                aw.name, aw.weight
            ));
        }
        if aw.weight < dec!(-0.10) {
            warnings.push(format!(
                "Short position: {} has weight {:.4}",
                aw.name, aw.weight
            ));
        }
    }
    if hhi_concentration > dec!(0.5) {
        warnings.push(format!(
            "High concentration: HHI = {:.4}",
            hhi_concentration
        ));
    }
    if stats.returns.len() < 30 {
        warnings.push(format!(
            "Only {} return observations; estimates are noisy",
            stats.returns.len()
        ));
    }

    tracing::info!(
        assets = n,
        objective = ?input.objective,
        solver_calls,
        risk = %optimal.risk,
        expected_return = %optimal.expected_return,
        "portfolio optimization finished"
    );

    let output = PortfolioOptimizationOutput {
        asset_names: stats.asset_names.clone(),
        mean_returns: stats.mean_returns.clone(),
        volatilities: stats.volatilities.clone(),
        min_variance_portfolio,
        optimal_portfolio,
        achievable_return_range: ValueRange {
            min: ach_lo,
            max: ach_hi,
        },
        efficient_return_range: ValueRange {
            min: eff_lo,
            max: eff_hi,
        },
        achievable_risk_range: ValueRange {
            min: risk_lo,
            max: risk_hi,
        },
        frontier,
        highlighted_points,
        diversification_ratio,
        hhi_concentration,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Markowitz Mean-Variance Optimization (active-set QP)",
        &serde_json::json!({
            "n_assets": n,
            "observations": input.prices.num_observations(),
            "bounds": config.bounds.to_string(),
            "objective": input.objective,
            "frontier_range": range,
            "frontier_points": range.points(&config.frontier),
            "return_type": "simple, per period",
            "covariance": "sample (T - 1)",
        }),
        warnings,
        elapsed,
        solver_calls,
        output,
    ))
}

/// Per-asset breakdown of a solved portfolio.
pub fn summarize(stats: &ReturnStatistics, result: &OptimizationResult) -> PortfolioSummary {
    let sigma_w = mat_vec_multiply(&stats.covariance_matrix, &result.weights);
    let weights = result
        .weights
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let mcr = if result.risk.is_zero() {
                Decimal::ZERO
            } else {
                sigma_w[i] / result.risk
            };
            AssetWeight {
                name: stats.asset_names[i].clone(),
                weight: *w,
                contribution_to_risk: *w * mcr,
                contribution_to_return: *w * stats.mean_returns[i],
            }
        })
        .collect();
    PortfolioSummary {
        weights,
        expected_return: result.expected_return,
        risk: result.risk,
    }
}

#[cfg(feature = "parallel")]
fn build_frontier(
    core: &OptimizerCore<'_>,
    config: &EngineConfig,
    range: SweepRange,
) -> MarkowitzResult<FrontierCurve> {
    crate::frontier::generate_frontier_parallel(core, &config.frontier, range)
}

#[cfg(not(feature = "parallel"))]
fn build_frontier(
    core: &OptimizerCore<'_>,
    config: &EngineConfig,
    range: SweepRange,
) -> MarkowitzResult<FrontierCurve> {
    crate::frontier::generate_frontier(core, &config.frontier, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::PriceSeries;

    fn prices() -> PriceMatrix {
        PriceMatrix::new(vec![
            PriceSeries {
                asset: "AAA".into(),
                prices: vec![
                    dec!(100),
                    dec!(101),
                    dec!(100.5),
                    dec!(102),
                    dec!(103),
                    dec!(102.5),
                    dec!(104),
                ],
            },
            PriceSeries {
                asset: "BBB".into(),
                prices: vec![
                    dec!(50),
                    dec!(52),
                    dec!(51),
                    dec!(54),
                    dec!(53),
                    dec!(56),
                    dec!(58),
                ],
            },
            PriceSeries {
                asset: "CCC".into(),
                prices: vec![
                    dec!(20),
                    dec!(20.2),
                    dec!(20.5),
                    dec!(20.4),
                    dec!(20.9),
                    dec!(21),
                    dec!(21.1),
                ],
            },
        ])
    }

    fn input(objective: Objective) -> PortfolioOptimizationInput {
        let mut config = EngineConfig::default();
        config.frontier.full_sweep_points = 10;
        config.frontier.restricted_sweep_points = 8;
        PortfolioOptimizationInput {
            prices: prices(),
            objective,
            config,
            highlights: vec![],
        }
    }

    #[test]
    fn test_minimum_variance_run_uses_full_frontier() {
        let out = optimize_portfolio(&input(Objective::MinimumVariance)).unwrap();
        let r = &out.result;
        assert_eq!(r.frontier.len(), 10);
        assert_eq!(r.frontier.range, SweepRange::Full);
        assert_eq!(
            r.optimal_portfolio.expected_return,
            r.min_variance_portfolio.expected_return
        );
        assert!(r.highlighted_points.is_empty());
        assert_eq!(out.metadata.solver_calls, 12);
    }

    #[test]
    fn test_risk_contributions_sum_to_risk() {
        let out = optimize_portfolio(&input(Objective::MinimumVariance)).unwrap();
        let p = &out.result.optimal_portfolio;
        let total: Decimal = p.weights.iter().map(|w| w.contribution_to_risk).sum();
        assert!((total - p.risk).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_target_return_outside_efficient_range_rejected() {
        let out = optimize_portfolio(&input(Objective::MinimumVariance)).unwrap();
        let below = out.result.efficient_return_range.min - dec!(0.0001);
        let err = optimize_portfolio(&input(Objective::TargetReturn { target: below })).unwrap_err();
        assert!(matches!(
            err,
            MarkowitzError::InfeasibleTarget {
                axis: FrontierAxis::Return,
                ..
            }
        ));
    }

    #[test]
    fn test_short_observation_warning() {
        let out = optimize_portfolio(&input(Objective::MinimumVariance)).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("observations")));
    }
}
