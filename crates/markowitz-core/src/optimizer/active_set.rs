//! Primal active-set method for convex quadratic programs of the form
//!
//! ```text
//! min  1/2 w' H w
//! s.t. A w = A w0          (equality rows, satisfied by the start point)
//!      lower <= w_i <= upper
//! ```
//!
//! Each iteration solves the equality-constrained subproblem on the free
//! variables through its KKT system. A non-zero step is shortened to the first
//! blocking bound, which then joins the working set; a zero step checks the
//! bound multipliers and releases the most negative one. For a quadratic
//! objective this is exactly the SQP iteration with an exact Hessian.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::SolverSettings;
use crate::error::MarkowitzError;
use crate::linalg::{mat_vec_multiply, max_abs, solve_linear_system, vec_dot};
use crate::MarkowitzResult;

/// Pivot threshold for the KKT system, relative to its largest entry.
const KKT_PIVOT_TOLERANCE: Decimal = dec!(0.00000000000001);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarState {
    Free,
    Active(Bound),
    /// Fixed for the whole solve; never released.
    Pinned,
}

pub(crate) struct ActiveSetProblem<'a> {
    pub hessian: &'a [Vec<Decimal>],
    pub equality_rows: Vec<Vec<Decimal>>,
    pub lower: Decimal,
    pub upper: Decimal,
    /// Variables held at their start value.
    pub pinned: Vec<bool>,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveSetSolution {
    pub weights: Vec<Decimal>,
    pub iterations: u32,
}

/// Run the active-set iteration from a feasible `start`.
pub(crate) fn solve(
    problem: &ActiveSetProblem<'_>,
    start: Vec<Decimal>,
    settings: &SolverSettings,
    label: &str,
) -> MarkowitzResult<ActiveSetSolution> {
    let n = start.len();
    let tol = settings.tolerance;
    let mut w = start;
    let mut state: Vec<VarState> = problem
        .pinned
        .iter()
        .map(|&p| if p { VarState::Pinned } else { VarState::Free })
        .collect();
    let mut last_delta = Decimal::ZERO;

    for iteration in 1..=settings.max_iterations {
        let free: Vec<usize> = (0..n).filter(|&i| state[i] == VarState::Free).collect();
        let grad = mat_vec_multiply(problem.hessian, &w);
        let rows = independent_rows(&problem.equality_rows, &free, settings);

        let (step, multipliers) = solve_kkt(problem.hessian, &free, &rows, &grad).ok_or_else(|| {
            MarkowitzError::DegenerateInput(format!(
                "{}: KKT system is singular on {} free weights",
                label,
                free.len()
            ))
        })?;

        let step_norm = max_abs(step.iter().copied());
        last_delta = step_norm;

        if step_norm <= tol {
            // Stationary on the working set: check bound multipliers.
            let mut release: Option<(usize, Decimal)> = None;
            for i in 0..n {
                let bound = match state[i] {
                    VarState::Active(b) => b,
                    _ => continue,
                };
                let coupling: Decimal = rows
                    .iter()
                    .zip(multipliers.iter())
                    .map(|(r, m)| *m * r[i])
                    .sum();
                let nu = match bound {
                    Bound::Lower => grad[i] + coupling,
                    Bound::Upper => -(grad[i] + coupling),
                };
                if nu < -tol && release.map_or(true, |(_, best)| nu < best) {
                    release = Some((i, nu));
                }
            }

            match release {
                None => {
                    tracing::trace!(solver = label, iteration, "active set converged");
                    return Ok(ActiveSetSolution {
                        weights: w,
                        iterations: iteration,
                    });
                }
                Some((i, nu)) => {
                    tracing::trace!(solver = label, iteration, index = i, multiplier = %nu, "releasing bound");
                    state[i] = VarState::Free;
                    continue;
                }
            }
        }

        // Longest step along `step` that keeps every free weight in the box.
        let mut alpha = Decimal::ONE;
        let mut blocking: Option<(usize, Bound)> = None;
        for (k, &i) in free.iter().enumerate() {
            let p = step[k];
            let (ratio, bound) = if p < Decimal::ZERO {
                ((problem.lower - w[i]) / p, Bound::Lower)
            } else if p > Decimal::ZERO {
                ((problem.upper - w[i]) / p, Bound::Upper)
            } else {
                continue;
            };
            let ratio = ratio.max(Decimal::ZERO);
            if ratio < alpha {
                alpha = ratio;
                blocking = Some((i, bound));
            }
        }

        for (k, &i) in free.iter().enumerate() {
            w[i] += alpha * step[k];
        }
        if let Some((i, bound)) = blocking {
            w[i] = match bound {
                Bound::Lower => problem.lower,
                Bound::Upper => problem.upper,
            };
            state[i] = VarState::Active(bound);
            tracing::trace!(solver = label, iteration, index = i, alpha = %alpha, "bound became active");
        }
    }

    tracing::warn!(
        solver = label,
        iterations = settings.max_iterations,
        last_delta = %last_delta,
        "active-set iteration budget exhausted"
    );
    Err(MarkowitzError::SolverNonConvergence {
        function: label.to_string(),
        iterations: settings.max_iterations,
        last_delta,
    })
}

/// Equality rows restricted to `free`, dropping rows that are (numerically)
/// combinations of earlier ones on those columns.
///
/// Returned rows keep their full length so multipliers can be applied to
/// working-set columns as well.
fn independent_rows(
    rows: &[Vec<Decimal>],
    free: &[usize],
    settings: &SolverSettings,
) -> Vec<Vec<Decimal>> {
    let rel_tol = settings.singularity_tolerance * settings.singularity_tolerance;
    let mut kept: Vec<Vec<Decimal>> = Vec::new();
    // Residuals of the kept rows on the free columns (Gram-Schmidt basis).
    let mut basis: Vec<Vec<Decimal>> = Vec::new();

    for row in rows {
        let restricted: Vec<Decimal> = free.iter().map(|&i| row[i]).collect();
        let norm_sq = vec_dot(&restricted, &restricted);
        if norm_sq.is_zero() {
            continue;
        }
        let mut residual = restricted.clone();
        for q in &basis {
            let coef = vec_dot(&residual, q) / vec_dot(q, q);
            for (r, qi) in residual.iter_mut().zip(q.iter()) {
                *r -= coef * *qi;
            }
        }
        if vec_dot(&residual, &residual) <= rel_tol * norm_sq {
            continue;
        }
        basis.push(residual);
        kept.push(row.clone());
    }
    kept
}

/// Solve
///
/// ```text
/// [ H_FF  A_F' ] [ p  ]   [ -g_F ]
/// [ A_F   0    ] [ mu ] = [  0   ]
/// ```
///
/// returning the step on the free variables and the row multipliers.
fn solve_kkt(
    hessian: &[Vec<Decimal>],
    free: &[usize],
    rows: &[Vec<Decimal>],
    grad: &[Decimal],
) -> Option<(Vec<Decimal>, Vec<Decimal>)> {
    let nf = free.len();
    let m = rows.len();
    let size = nf + m;
    if size == 0 {
        return Some((Vec::new(), Vec::new()));
    }

    let mut kkt = vec![vec![Decimal::ZERO; size]; size];
    let mut rhs = vec![Decimal::ZERO; size];
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            kkt[a][b] = hessian[i][j];
        }
        for (r, row) in rows.iter().enumerate() {
            kkt[a][nf + r] = row[i];
            kkt[nf + r][a] = row[i];
        }
        rhs[a] = -grad[i];
    }

    let solution = solve_linear_system(kkt, rhs, KKT_PIVOT_TOLERANCE)?;
    let (step, multipliers) = solution.split_at(nf);
    Some((step.to_vec(), multipliers.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> SolverSettings {
        SolverSettings::default()
    }

    #[test]
    fn test_interior_solution_matches_closed_form() {
        // min w'Hw, sum = 1: w* proportional to H^-1 1
        let h = vec![vec![dec!(4), dec!(1)], vec![dec!(1), dec!(9)]];
        let problem = ActiveSetProblem {
            hessian: &h,
            equality_rows: vec![vec![dec!(1), dec!(1)]],
            lower: dec!(0),
            upper: dec!(1),
            pinned: vec![false, false],
        };
        let sol = solve(&problem, vec![dec!(0.5), dec!(0.5)], &settings(), "test").unwrap();
        // (9 - 1) / (4 + 9 - 2) = 8/11
        assert!((sol.weights[0] - dec!(8) / dec!(11)).abs() < dec!(0.000000001));
        assert!((sol.weights[0] + sol.weights[1] - dec!(1)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_bound_becomes_active() {
        // Unconstrained optimum puts negative weight on asset 1.
        let h = vec![vec![dec!(1), dec!(2)], vec![dec!(2), dec!(9)]];
        let problem = ActiveSetProblem {
            hessian: &h,
            equality_rows: vec![vec![dec!(1), dec!(1)]],
            lower: dec!(0),
            upper: dec!(1),
            pinned: vec![false, false],
        };
        let sol = solve(&problem, vec![dec!(0.5), dec!(0.5)], &settings(), "test").unwrap();
        assert_eq!(sol.weights[0], dec!(1));
        assert!(sol.weights[1].abs() < dec!(0.000000001));
        assert!(sol.iterations >= 2);
    }

    #[test]
    fn test_pinned_variables_do_not_move() {
        let h = vec![
            vec![dec!(1), dec!(0), dec!(0)],
            vec![dec!(0), dec!(1), dec!(0)],
            vec![dec!(0), dec!(0), dec!(1)],
        ];
        let problem = ActiveSetProblem {
            hessian: &h,
            equality_rows: vec![vec![dec!(1), dec!(1), dec!(1)]],
            lower: dec!(0),
            upper: dec!(1),
            pinned: vec![true, false, false],
        };
        let start = vec![dec!(0.6), dec!(0.3), dec!(0.1)];
        let sol = solve(&problem, start, &settings(), "test").unwrap();
        assert_eq!(sol.weights[0], dec!(0.6));
        assert!((sol.weights[1] - dec!(0.2)).abs() < dec!(0.000000001));
        assert!((sol.weights[2] - dec!(0.2)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let h = vec![vec![dec!(1), dec!(2)], vec![dec!(2), dec!(9)]];
        let problem = ActiveSetProblem {
            hessian: &h,
            equality_rows: vec![vec![dec!(1), dec!(1)]],
            lower: dec!(0),
            upper: dec!(1),
            pinned: vec![false, false],
        };
        let capped = SolverSettings {
            max_iterations: 1,
            ..settings()
        };
        let err = solve(&problem, vec![dec!(0.5), dec!(0.5)], &capped, "capped").unwrap_err();
        assert!(matches!(
            err,
            MarkowitzError::SolverNonConvergence { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_dependent_rows_are_dropped() {
        let rows = vec![
            vec![dec!(1), dec!(1), dec!(1)],
            vec![dec!(0.5), dec!(0.5), dec!(0.9)],
        ];
        // On columns {0, 1} the second row is half the first.
        let kept = independent_rows(&rows, &[0, 1], &settings());
        assert_eq!(kept.len(), 1);
        let kept = independent_rows(&rows, &[0, 1, 2], &settings());
        assert_eq!(kept.len(), 2);
    }
}
