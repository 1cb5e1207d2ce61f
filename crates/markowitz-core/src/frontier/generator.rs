use serde::{Deserialize, Serialize};

use crate::config::FrontierConfig;
use crate::linalg::linspace;
use crate::optimizer::OptimizerCore;
use crate::types::Rate;
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One solved point of a frontier sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Grid value the point was solved for.
    pub target_return: Rate,
    pub risk: Rate,
    /// Achieved return; equals `target_return` up to the solver tolerance.
    pub expected_return: Rate,
    pub weights: Vec<Rate>,
}

/// Range of target returns a sweep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SweepRange {
    /// Lowest single-asset mean return to the highest achievable return.
    Full,
    /// Minimum-variance return to the highest achievable return (the
    /// efficient branch only).
    FromMinimumVariance { min_variance_return: Rate },
}

impl SweepRange {
    /// `(start, end)` of the grid.
    ///
    /// The grid ends at the top of [`OptimizerCore::achievable_return_range`]:
    /// the highest asset mean when long-only, higher once short positions can
    /// fund a leveraged best asset. Both ends stay inside that range.
    pub fn endpoints(&self, core: &OptimizerCore<'_>) -> (Rate, Rate) {
        let (lowest_mean, _) = core.statistics().mean_return_bounds();
        let (achievable_lo, hi) = core.achievable_return_range();
        match *self {
            SweepRange::Full => (lowest_mean.max(achievable_lo).min(hi), hi),
            SweepRange::FromMinimumVariance {
                min_variance_return,
            } => (min_variance_return.min(hi), hi),
        }
    }

    /// Configured number of grid points for this range.
    pub fn points(&self, config: &FrontierConfig) -> usize {
        match self {
            SweepRange::Full => config.full_sweep_points,
            SweepRange::FromMinimumVariance { .. } => config.restricted_sweep_points,
        }
    }
}

/// Sampled frontier ordered by ascending target return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierCurve {
    pub range: SweepRange,
    pub points: Vec<FrontierPoint>,
}

impl FrontierCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn risks(&self) -> Vec<Rate> {
        self.points.iter().map(|p| p.risk).collect()
    }

    pub fn returns(&self) -> Vec<Rate> {
        self.points.iter().map(|p| p.target_return).collect()
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Lazy sweep: each `next()` solves one target-return problem.
///
/// Finite, yields points in grid order and stops at the first solver error.
pub struct FrontierSweep<'c, 'a> {
    core: &'c OptimizerCore<'a>,
    grid: std::vec::IntoIter<Rate>,
    failed: bool,
}

impl<'c, 'a> FrontierSweep<'c, 'a> {
    pub fn new(core: &'c OptimizerCore<'a>, range: SweepRange, points: usize) -> Self {
        let (start, end) = range.endpoints(core);
        Self {
            core,
            grid: linspace(start, end, points).into_iter(),
            failed: false,
        }
    }
}

impl Iterator for FrontierSweep<'_, '_> {
    type Item = MarkowitzResult<FrontierPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let target = self.grid.next()?;
        let point = solve_point(self.core, target);
        if point.is_err() {
            self.failed = true;
        }
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.grid.len()))
        }
    }
}

fn solve_point(core: &OptimizerCore<'_>, target: Rate) -> MarkowitzResult<FrontierPoint> {
    let res = core.minimize_variance_for_target_return(target)?;
    Ok(FrontierPoint {
        target_return: target,
        risk: res.risk,
        expected_return: res.expected_return,
        weights: res.weights,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Solve every grid point of `range` and collect the curve.
pub fn generate_frontier(
    core: &OptimizerCore<'_>,
    config: &FrontierConfig,
    range: SweepRange,
) -> MarkowitzResult<FrontierCurve> {
    config.validate()?;
    let points = FrontierSweep::new(core, range, range.points(config))
        .collect::<MarkowitzResult<Vec<_>>>()?;
    tracing::debug!(points = points.len(), ?range, "frontier generated");
    Ok(FrontierCurve { range, points })
}

/// Same curve as [`generate_frontier`], with the independent solves spread
/// over the rayon thread pool.
#[cfg(feature = "parallel")]
pub fn generate_frontier_parallel(
    core: &OptimizerCore<'_>,
    config: &FrontierConfig,
    range: SweepRange,
) -> MarkowitzResult<FrontierCurve> {
    use rayon::prelude::*;

    config.validate()?;
    let (start, end) = range.endpoints(core);
    let grid = linspace(start, end, range.points(config));
    let points = grid
        .into_par_iter()
        .map(|target| solve_point(core, target))
        .collect::<MarkowitzResult<Vec<_>>>()?;
    tracing::debug!(points = points.len(), ?range, "frontier generated in parallel");
    Ok(FrontierCurve { range, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverSettings;
    use crate::optimizer::WeightBoundsPolicy;
    use crate::returns::ReturnStatistics;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn stats() -> ReturnStatistics {
        ReturnStatistics::from_moments(
            vec!["A".into(), "B".into(), "C".into()],
            vec![dec!(0.004), dec!(0.008), dec!(0.012)],
            vec![
                vec![dec!(0.0004), dec!(0.0001), dec!(0.00005)],
                vec![dec!(0.0001), dec!(0.0009), dec!(0.0002)],
                vec![dec!(0.00005), dec!(0.0002), dec!(0.0025)],
            ],
        )
        .unwrap()
    }

    fn small_config() -> FrontierConfig {
        FrontierConfig {
            full_sweep_points: 9,
            restricted_sweep_points: 5,
        }
    }

    #[test]
    fn test_full_sweep_spans_asset_means() {
        let s = stats();
        let core =
            OptimizerCore::new(&s, WeightBoundsPolicy::NoShortSelling, SolverSettings::default())
                .unwrap();
        let curve = generate_frontier(&core, &small_config(), SweepRange::Full).unwrap();
        assert_eq!(curve.len(), 9);
        assert_eq!(curve.points[0].target_return, dec!(0.004));
        assert_eq!(curve.points[8].target_return, dec!(0.012));
        let returns = curve.returns();
        assert!(returns.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_restricted_sweep_starts_at_min_variance() {
        let s = stats();
        let core =
            OptimizerCore::new(&s, WeightBoundsPolicy::NoShortSelling, SolverSettings::default())
                .unwrap();
        let mv = core.minimize_variance().unwrap();
        let range = SweepRange::FromMinimumVariance {
            min_variance_return: mv.expected_return,
        };
        let curve = generate_frontier(&core, &small_config(), range).unwrap();
        assert_eq!(curve.len(), 5);
        assert_eq!(curve.points[0].target_return, mv.expected_return);
        // efficient branch: risk rises with return
        let risks = curve.risks();
        assert!(risks.windows(2).all(|w| w[0] <= w[1] + dec!(0.000001)));
    }

    #[test]
    fn test_short_selling_sweep_ends_at_achievable_maximum() {
        let s = stats();
        let core = OptimizerCore::new(
            &s,
            WeightBoundsPolicy::short_selling(),
            SolverSettings::default(),
        )
        .unwrap();
        let mv = core.minimize_variance().unwrap();
        let (_, eff_hi) = core.efficient_return_range(&mv);
        // long B and C at +1, A at -1
        assert_eq!(eff_hi, dec!(0.016));

        let range = SweepRange::FromMinimumVariance {
            min_variance_return: mv.expected_return,
        };
        assert_eq!(range.endpoints(&core), (mv.expected_return, eff_hi));
        let curve = generate_frontier(&core, &small_config(), range).unwrap();
        let last = &curve.points[curve.len() - 1];
        assert_eq!(last.target_return, eff_hi);
        assert!((last.expected_return - eff_hi).abs() < dec!(0.000001));

        let (full_lo, full_hi) = SweepRange::Full.endpoints(&core);
        assert_eq!(full_lo, dec!(0.004));
        assert_eq!(full_hi, eff_hi);
    }

    #[test]
    fn test_narrow_box_keeps_full_sweep_feasible() {
        let s = stats();
        let policy = WeightBoundsPolicy::ShortSelling {
            lower: dec!(-0.5),
            upper: dec!(0.5),
        };
        let core = OptimizerCore::new(&s, policy, SolverSettings::default()).unwrap();
        // no single asset fits in the box, so neither asset mean is reachable
        let (lo, hi) = core.achievable_return_range();
        assert_eq!((lo, hi), (dec!(0.006), dec!(0.010)));
        assert_eq!(SweepRange::Full.endpoints(&core), (lo, hi));
        let curve = generate_frontier(&core, &small_config(), SweepRange::Full).unwrap();
        assert_eq!(curve.len(), 9);
    }

    #[test]
    fn test_sweep_is_lazy_and_finite() {
        let s = stats();
        let core =
            OptimizerCore::new(&s, WeightBoundsPolicy::NoShortSelling, SolverSettings::default())
                .unwrap();
        let mut sweep = FrontierSweep::new(&core, SweepRange::Full, 4);
        assert_eq!(sweep.size_hint(), (0, Some(4)));
        let first = sweep.next().unwrap().unwrap();
        assert_eq!(first.target_return, dec!(0.004));
        assert_eq!(sweep.size_hint(), (0, Some(3)));
        assert_eq!(sweep.count(), 3);
    }
}
