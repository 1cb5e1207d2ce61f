use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarkowitzError;
use crate::frontier::generator::{FrontierCurve, FrontierPoint};
use crate::types::{FrontierAxis, Rate};
use crate::MarkowitzResult;

/// Curve point closest to a requested return or risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestMatch {
    pub index: usize,
    pub axis: FrontierAxis,
    /// Value that was searched for.
    pub target: Rate,
    pub point: FrontierPoint,
}

fn coordinate(point: &FrontierPoint, axis: FrontierAxis) -> Rate {
    match axis {
        FrontierAxis::Return => point.target_return,
        FrontierAxis::Risk => point.risk,
    }
}

/// Find the sampled point nearest to `target` along `axis`.
///
/// Scans consecutive pairs for one that brackets `target` and takes the
/// closer endpoint, the earlier one on a tie. Risk is not monotone over a
/// full-range curve, so several pairs can bracket it; the last one wins,
/// which lands on the upper (efficient) branch.
pub fn locate_nearest(
    curve: &FrontierCurve,
    target: Rate,
    axis: FrontierAxis,
) -> MarkowitzResult<NearestMatch> {
    let points = &curve.points;
    if points.len() < 2 {
        return Err(MarkowitzError::InsufficientData(format!(
            "nearest-point search needs at least 2 frontier points, got {}",
            points.len()
        )));
    }

    let mut found: Option<usize> = None;
    for i in 0..points.len() - 1 {
        let a = coordinate(&points[i], axis);
        let b = coordinate(&points[i + 1], axis);
        if target >= a.min(b) && target <= a.max(b) {
            let da = (target - a).abs();
            let db = (target - b).abs();
            found = Some(if da <= db { i } else { i + 1 });
        }
    }

    match found {
        Some(index) => Ok(NearestMatch {
            index,
            axis,
            target,
            point: points[index].clone(),
        }),
        None => {
            let values = points.iter().map(|p| coordinate(p, axis));
            let (min, max) = values.fold((Decimal::MAX, Decimal::MIN), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
            Err(MarkowitzError::InfeasibleTarget {
                axis,
                requested: target,
                min,
                max,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::generator::SweepRange;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn point(ret: Decimal, risk: Decimal) -> FrontierPoint {
        FrontierPoint {
            target_return: ret,
            risk,
            expected_return: ret,
            weights: vec![],
        }
    }

    fn curve(points: Vec<FrontierPoint>) -> FrontierCurve {
        FrontierCurve {
            range: SweepRange::Full,
            points,
        }
    }

    #[test]
    fn test_picks_closer_endpoint() {
        let c = curve(vec![
            point(dec!(0.010), dec!(0.02)),
            point(dec!(0.015), dec!(0.03)),
            point(dec!(0.020), dec!(0.05)),
        ]);
        let m = locate_nearest(&c, dec!(0.013), FrontierAxis::Return).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.point.target_return, dec!(0.015));
    }

    #[test]
    fn test_tie_goes_to_earlier_point() {
        let c = curve(vec![
            point(dec!(0.010), dec!(0.02)),
            point(dec!(0.020), dec!(0.04)),
        ]);
        let m = locate_nearest(&c, dec!(0.015), FrontierAxis::Return).unwrap();
        assert_eq!(m.index, 0);
    }

    #[test]
    fn test_risk_search_prefers_upper_branch() {
        // Risk falls then rises along a full-range curve.
        let c = curve(vec![
            point(dec!(0.004), dec!(0.020)),
            point(dec!(0.006), dec!(0.015)),
            point(dec!(0.008), dec!(0.016)),
            point(dec!(0.010), dec!(0.021)),
        ]);
        let m = locate_nearest(&c, dec!(0.0195), FrontierAxis::Risk).unwrap();
        assert_eq!(m.index, 3);
        assert_eq!(m.axis, FrontierAxis::Risk);
    }

    #[test]
    fn test_out_of_range_target_is_rejected() {
        let c = curve(vec![
            point(dec!(0.010), dec!(0.02)),
            point(dec!(0.020), dec!(0.04)),
        ]);
        let err = locate_nearest(&c, dec!(0.5), FrontierAxis::Return).unwrap_err();
        match err {
            MarkowitzError::InfeasibleTarget { min, max, .. } => {
                assert_eq!(min, dec!(0.010));
                assert_eq!(max, dec!(0.020));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_single_point_curve_is_insufficient() {
        let c = curve(vec![point(dec!(0.010), dec!(0.02))]);
        assert!(matches!(
            locate_nearest(&c, dec!(0.010), FrontierAxis::Return),
            Err(MarkowitzError::InsufficientData(_))
        ));
    }
}
