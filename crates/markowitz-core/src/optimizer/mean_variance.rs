use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::SolverSettings;
use crate::error::MarkowitzError;
use crate::linalg::{first_singular_pivot, max_abs, portfolio_std, sqrt_decimal, vec_dot};
use crate::optimizer::active_set::{self, ActiveSetProblem, ActiveSetSolution};
use crate::optimizer::bounds::WeightBoundsPolicy;
use crate::returns::statistics::validate_covariance_matrix;
use crate::returns::ReturnStatistics;
use crate::types::{FrontierAxis, Rate};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A solved (or evaluated) portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// One weight per asset, in price-matrix column order.
    pub weights: Vec<Rate>,
    /// Portfolio standard deviation `sqrt(w' C w)`.
    pub risk: Rate,
    /// `w . mean`
    pub expected_return: Rate,
    /// Active-set iterations summed over every solve.
    pub iterations: u32,
    /// Quadratic programs solved to produce this result.
    pub solves: u32,
}

/// Mean-variance optimizer over one set of return statistics.
///
/// Holds no mutable state: results needed by later solves (the
/// minimum-variance portfolio) are passed back in explicitly.
#[derive(Debug, Clone)]
pub struct OptimizerCore<'a> {
    stats: &'a ReturnStatistics,
    policy: WeightBoundsPolicy,
    settings: SolverSettings,
    /// Covariance divided by its largest diagonal entry.
    hessian: Vec<Vec<Decimal>>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl<'a> OptimizerCore<'a> {
    /// Validate the inputs and prepare the scaled problem.
    ///
    /// Fails with `DegenerateInput` when an asset has (near) zero variance or
    /// its returns are a linear combination of the other assets'.
    pub fn new(
        stats: &'a ReturnStatistics,
        policy: WeightBoundsPolicy,
        settings: SolverSettings,
    ) -> MarkowitzResult<Self> {
        settings.validate()?;
        let n = stats.num_assets();
        if n < 2 {
            return Err(MarkowitzError::InsufficientData(format!(
                "At least 2 assets required, got {}",
                n
            )));
        }
        if stats.mean_returns.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "mean_returns".into(),
                reason: format!("{} assets but {} means", n, stats.mean_returns.len()),
            });
        }
        validate_covariance_matrix(&stats.covariance_matrix, n)?;
        policy.validate(n)?;

        let hessian = check_and_scale_covariance(stats, settings.singularity_tolerance)?;

        Ok(Self {
            stats,
            policy,
            settings,
            hessian,
        })
    }

    pub fn statistics(&self) -> &ReturnStatistics {
        self.stats
    }

    pub fn policy(&self) -> WeightBoundsPolicy {
        self.policy
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn num_assets(&self) -> usize {
        self.stats.num_assets()
    }

    pub fn equal_weights(&self) -> Vec<Rate> {
        let n = self.num_assets();
        vec![Decimal::ONE / Decimal::from(n as i64); n]
    }

    /// Risk and return of arbitrary weights.
    pub fn evaluate(&self, weights: &[Rate]) -> MarkowitzResult<OptimizationResult> {
        if weights.len() != self.num_assets() {
            return Err(MarkowitzError::InvalidInput {
                field: "weights".into(),
                reason: format!(
                    "Expected {} weights but got {}",
                    self.num_assets(),
                    weights.len()
                ),
            });
        }
        Ok(self.result_from(weights.to_vec(), 0, 0))
    }

    /// Global minimum-variance portfolio under the budget and weight bounds.
    pub fn minimize_variance(&self) -> MarkowitzResult<OptimizationResult> {
        let problem = self.problem(vec![self.budget_row()], vec![false; self.num_assets()]);
        let solution = active_set::solve(
            &problem,
            self.equal_weights(),
            &self.settings,
            "minimize_variance",
        )?;
        let result = self.finish(solution, 1);
        tracing::debug!(
            iterations = result.iterations,
            risk = %result.risk,
            expected_return = %result.expected_return,
            "minimum-variance portfolio solved"
        );
        Ok(result)
    }

    /// Lowest and highest `w . mean` over all feasible weights.
    pub fn achievable_return_range(&self) -> (Rate, Rate) {
        let mean = &self.stats.mean_returns;
        let lo = vec_dot(&self.policy.extreme_portfolio(mean, false), mean);
        let hi = vec_dot(&self.policy.extreme_portfolio(mean, true), mean);
        (lo, hi)
    }

    /// Returns on the efficient branch: from the minimum-variance return up to
    /// the highest achievable return.
    pub fn efficient_return_range(&self, min_variance: &OptimizationResult) -> (Rate, Rate) {
        let (_, hi) = self.achievable_return_range();
        (min_variance.expected_return.min(hi), hi)
    }

    /// Minimum-variance portfolio whose expected return equals `target`.
    pub fn minimize_variance_for_target_return(
        &self,
        target: Rate,
    ) -> MarkowitzResult<OptimizationResult> {
        let tol = self.settings.tolerance;
        let (r_min, r_max) = self.achievable_return_range();
        if target < r_min - tol || target > r_max + tol {
            return Err(MarkowitzError::InfeasibleTarget {
                axis: FrontierAxis::Return,
                requested: target,
                min: r_min,
                max: r_max,
            });
        }

        let result = if target >= r_max - tol {
            self.solve_extreme_face(true)?
        } else if target <= r_min + tol {
            self.solve_extreme_face(false)?
        } else {
            let mean = &self.stats.mean_returns;
            let scale = max_abs(mean.iter().copied());
            let return_row: Vec<Decimal> = mean.iter().map(|m| *m / scale).collect();
            let start = self.interior_start(target);
            let problem = self.problem(
                vec![self.budget_row(), return_row],
                vec![false; self.num_assets()],
            );
            let solution = active_set::solve(
                &problem,
                start,
                &self.settings,
                "minimize_variance_for_target_return",
            )?;
            self.finish(solution, 1)
        };

        tracing::debug!(
            target = %target,
            iterations = result.iterations,
            risk = %result.risk,
            "target-return portfolio solved"
        );
        Ok(result)
    }

    /// Risk range over which a risk budget has a solution, together with the
    /// portfolio at the upper end (the least risky portfolio earning the
    /// highest achievable return).
    pub fn achievable_risk_range(
        &self,
        min_variance: &OptimizationResult,
    ) -> MarkowitzResult<(Rate, Rate, OptimizationResult)> {
        let top = self.solve_extreme_face(true)?;
        let lo = min_variance.risk;
        let hi = top.risk.max(lo);
        Ok((lo, hi, top))
    }

    /// Highest expected return whose portfolio risk equals `risk`.
    ///
    /// Walks the efficient branch between the minimum-variance return and the
    /// highest achievable return, bisecting on target return until the
    /// minimum risk for that return matches the budget.
    pub fn maximize_return_for_risk_budget(
        &self,
        risk: Rate,
        min_variance: &OptimizationResult,
    ) -> MarkowitzResult<OptimizationResult> {
        let tol = self.settings.tolerance;
        let (risk_lo, risk_hi, top) = self.achievable_risk_range(min_variance)?;
        if risk < risk_lo - tol || risk > risk_hi + tol {
            return Err(MarkowitzError::InfeasibleTarget {
                axis: FrontierAxis::Risk,
                requested: risk,
                min: risk_lo,
                max: risk_hi,
            });
        }
        if risk >= risk_hi - tol {
            return Ok(top);
        }
        if risk <= risk_lo + tol {
            return Ok(min_variance.clone());
        }

        let (mut r_lo, mut r_hi) = self.efficient_return_range(min_variance);
        let mut iterations = top.iterations;
        let mut solves = top.solves;
        let mut last_delta = risk_hi - risk_lo;

        for step in 1..=self.settings.max_iterations {
            let r_mid = (r_lo + r_hi) / Decimal::TWO;
            let candidate = self.minimize_variance_for_target_return(r_mid)?;
            iterations += candidate.iterations;
            solves += candidate.solves;
            last_delta = candidate.risk - risk;

            if last_delta.abs() <= tol {
                tracing::debug!(
                    risk = %risk,
                    steps = step,
                    expected_return = %candidate.expected_return,
                    "risk-budget portfolio solved"
                );
                return Ok(OptimizationResult {
                    iterations,
                    solves,
                    ..candidate
                });
            }
            if r_hi - r_lo <= tol * tol {
                tracing::warn!(
                    risk = %risk,
                    last_delta = %last_delta,
                    "risk-budget bracket collapsed before the budget was met"
                );
                return Err(MarkowitzError::SolverNonConvergence {
                    function: "maximize_return_for_risk_budget".into(),
                    iterations: step,
                    last_delta: last_delta.abs(),
                });
            }
            if last_delta < Decimal::ZERO {
                r_lo = r_mid;
            } else {
                r_hi = r_mid;
            }
        }

        tracing::warn!(risk = %risk, last_delta = %last_delta, "risk-budget bisection stalled");
        Err(MarkowitzError::SolverNonConvergence {
            function: "maximize_return_for_risk_budget".into(),
            iterations: self.settings.max_iterations,
            last_delta: last_delta.abs(),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn budget_row(&self) -> Vec<Decimal> {
        vec![Decimal::ONE; self.num_assets()]
    }

    fn problem(
        &self,
        equality_rows: Vec<Vec<Decimal>>,
        pinned: Vec<bool>,
    ) -> ActiveSetProblem<'_> {
        let (lower, upper) = self.policy.bounds();
        ActiveSetProblem {
            hessian: &self.hessian,
            equality_rows,
            lower,
            upper,
            pinned,
        }
    }

    /// Strictly feasible point earning `target`: equal weights moved toward
    /// the extreme portfolio on the target's side.
    fn interior_start(&self, target: Rate) -> Vec<Rate> {
        let mean = &self.stats.mean_returns;
        let equal = self.equal_weights();
        let r_equal = vec_dot(&equal, mean);
        let extreme = self.policy.extreme_portfolio(mean, target >= r_equal);
        let r_extreme = vec_dot(&extreme, mean);
        if r_extreme == r_equal {
            return equal;
        }
        let t = (target - r_equal) / (r_extreme - r_equal);
        equal
            .iter()
            .zip(extreme.iter())
            .map(|(e, x)| *e + t * (*x - *e))
            .collect()
    }

    /// Minimum-variance portfolio on the face of the feasible region where
    /// `w . mean` is extreme.
    ///
    /// On that face every asset with a strictly better mean than the marginal
    /// one sits at the upper bound and every strictly worse one at the lower
    /// bound; only assets tied with the marginal mean can trade off risk.
    fn solve_extreme_face(&self, maximize: bool) -> MarkowitzResult<OptimizationResult> {
        let mean = &self.stats.mean_returns;
        let (lower, _) = self.policy.bounds();
        let vertex = self.policy.extreme_portfolio(mean, maximize);

        let marginal = vertex
            .iter()
            .zip(mean.iter())
            .filter(|(w, _)| **w > lower)
            .map(|(_, m)| *m)
            .reduce(|acc, m| {
                let worse = if maximize { m < acc } else { m > acc };
                if worse {
                    m
                } else {
                    acc
                }
            });
        let marginal = match marginal {
            Some(m) => m,
            None => {
                return Err(MarkowitzError::DegenerateInput(
                    "no asset carries weight at the extreme return".into(),
                ))
            }
        };

        let pinned: Vec<bool> = mean.iter().map(|m| *m != marginal).collect();
        let label = if maximize {
            "maximum_return_portfolio"
        } else {
            "minimum_return_portfolio"
        };
        let problem = self.problem(vec![self.budget_row()], pinned);
        let solution = active_set::solve(&problem, vertex, &self.settings, label)?;
        Ok(self.finish(solution, 1))
    }

    fn finish(&self, solution: ActiveSetSolution, solves: u32) -> OptimizationResult {
        self.result_from(solution.weights, solution.iterations, solves)
    }

    fn result_from(&self, weights: Vec<Rate>, iterations: u32, solves: u32) -> OptimizationResult {
        let risk = portfolio_std(&weights, &self.stats.covariance_matrix);
        let expected_return = vec_dot(&weights, &self.stats.mean_returns);
        OptimizationResult {
            weights,
            risk,
            expected_return,
            iterations,
            solves,
        }
    }
}

/// Reject constant or collinear assets and return the covariance scaled so
/// its largest diagonal entry is one.
fn check_and_scale_covariance(
    stats: &ReturnStatistics,
    singularity_tolerance: Decimal,
) -> MarkowitzResult<Vec<Vec<Decimal>>> {
    let cov = &stats.covariance_matrix;
    let n = cov.len();
    let max_var = (0..n)
        .map(|i| cov[i][i])
        .fold(Decimal::ZERO, |acc, v| acc.max(v));
    if max_var <= Decimal::ZERO {
        return Err(MarkowitzError::DegenerateInput(
            "covariance matrix is zero; prices do not vary".into(),
        ));
    }

    for i in 0..n {
        if cov[i][i] <= singularity_tolerance * max_var {
            return Err(MarkowitzError::DegenerateInput(format!(
                "asset '{}' has (near) zero return variance",
                stats.asset_names[i]
            )));
        }
    }

    let sd: Vec<Decimal> = (0..n).map(|i| sqrt_decimal(cov[i][i])).collect();
    let corr: Vec<Vec<Decimal>> = (0..n)
        .map(|i| (0..n).map(|j| cov[i][j] / (sd[i] * sd[j])).collect())
        .collect();
    if let Some(k) = first_singular_pivot(&corr, singularity_tolerance) {
        return Err(MarkowitzError::DegenerateInput(format!(
            "asset '{}' is a linear combination of earlier assets; covariance is singular",
            stats.asset_names[k]
        )));
    }

    Ok(cov
        .iter()
        .map(|row| row.iter().map(|c| *c / max_var).collect())
        .collect())
}
