use markowitz_core::config::SolverSettings;
use markowitz_core::optimizer::{OptimizerCore, WeightBoundsPolicy};
use markowitz_core::returns::{compute_return_statistics, PriceMatrix, ReturnStatistics};
use markowitz_core::{FrontierAxis, MarkowitzError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TOL: Decimal = dec!(0.000001);

// ===========================================================================
// Optimizer tests driven from price histories
// ===========================================================================

fn four_asset_prices() -> PriceMatrix {
    PriceMatrix::from_columns(vec![
        (
            "BOND",
            vec![
                dec!(100), dec!(100.2), dec!(100.1), dec!(100.4), dec!(100.5), dec!(100.3),
                dec!(100.7), dec!(100.8), dec!(100.9), dec!(101.2),
            ],
        ),
        (
            "EQTY",
            vec![
                dec!(50), dec!(51.5), dec!(50.2), dec!(52.8), dec!(53.1), dec!(51.9),
                dec!(54.4), dec!(55.0), dec!(53.7), dec!(56.2),
            ],
        ),
        (
            "GOLD",
            vec![
                dec!(180), dec!(178), dec!(181), dec!(183), dec!(182), dec!(186),
                dec!(185), dec!(184), dec!(188), dec!(189),
            ],
        ),
        (
            "TECH",
            vec![
                dec!(30), dec!(31.8), dec!(30.1), dec!(33.0), dec!(34.2), dec!(32.0),
                dec!(35.5), dec!(36.1), dec!(34.0), dec!(37.9),
            ],
        ),
    ])
}

fn sum(w: &[Decimal]) -> Decimal {
    w.iter().copied().sum()
}

// ---------------------------------------------------------------------------
// Minimum variance
// ---------------------------------------------------------------------------

#[test]
fn test_min_variance_from_prices_respects_constraints() {
    let stats = compute_return_statistics(&four_asset_prices()).unwrap();
    let core = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap();
    let mv = core.minimize_variance().unwrap();

    assert!((sum(&mv.weights) - Decimal::ONE).abs() < TOL);
    assert!(WeightBoundsPolicy::NoShortSelling.contains(&mv.weights, TOL));
    assert!(mv.risk >= Decimal::ZERO);

    let eq = core.evaluate(&core.equal_weights()).unwrap();
    assert!(mv.risk <= eq.risk, "{} > {}", mv.risk, eq.risk);
}

#[test]
fn test_short_selling_min_variance_not_riskier_than_long_only() {
    let stats = compute_return_statistics(&four_asset_prices()).unwrap();
    let long_only = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap()
    .minimize_variance()
    .unwrap();
    let short = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::short_selling(),
        SolverSettings::default(),
    )
    .unwrap()
    .minimize_variance()
    .unwrap();
    assert!(short.risk <= long_only.risk + TOL);
    assert!((sum(&short.weights) - Decimal::ONE).abs() < TOL);
    assert!(WeightBoundsPolicy::short_selling().contains(&short.weights, TOL));
}

// ---------------------------------------------------------------------------
// Target return
// ---------------------------------------------------------------------------

#[test]
fn test_target_returns_across_the_range() {
    let stats = compute_return_statistics(&four_asset_prices()).unwrap();
    let core = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap();
    let (lo, hi) = core.achievable_return_range();
    assert_eq!((lo, hi), stats.mean_return_bounds());

    for k in 0..=10 {
        let target = lo + (hi - lo) * Decimal::from(k) / dec!(10);
        let res = core.minimize_variance_for_target_return(target).unwrap();
        assert!(
            (res.expected_return - target).abs() < TOL,
            "target {} achieved {}",
            target,
            res.expected_return
        );
        assert!((sum(&res.weights) - Decimal::ONE).abs() < TOL);
        assert!(WeightBoundsPolicy::NoShortSelling.contains(&res.weights, TOL));
    }
}

#[test]
fn test_target_return_above_best_asset_is_infeasible_without_shorts() {
    let stats = compute_return_statistics(&four_asset_prices()).unwrap();
    let core = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap();
    let (_, hi) = stats.mean_return_bounds();
    let err = core
        .minimize_variance_for_target_return(hi + dec!(0.001))
        .unwrap_err();
    assert!(matches!(
        err,
        MarkowitzError::InfeasibleTarget {
            axis: FrontierAxis::Return,
            ..
        }
    ));
    assert!(err.hint().unwrap().contains("choose a return between"));
}

// ---------------------------------------------------------------------------
// Risk budget
// ---------------------------------------------------------------------------

#[test]
fn test_risk_budget_maximizes_return_on_efficient_branch() {
    let stats = compute_return_statistics(&four_asset_prices()).unwrap();
    let core = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap();
    let mv = core.minimize_variance().unwrap();
    let (lo, hi, _) = core.achievable_risk_range(&mv).unwrap();
    assert!(lo < hi);

    let budget = lo + (hi - lo) / dec!(4);
    let res = core.maximize_return_for_risk_budget(budget, &mv).unwrap();
    assert!((res.risk - budget).abs() < TOL);

    // Any portfolio with the same return has at least this risk.
    let check = core
        .minimize_variance_for_target_return(res.expected_return)
        .unwrap();
    assert!((check.risk - res.risk).abs() < TOL);
    assert!(res.expected_return >= mv.expected_return - TOL);
}

// ---------------------------------------------------------------------------
// Degenerate inputs
// ---------------------------------------------------------------------------

#[test]
fn test_two_observations_are_degenerate() {
    let prices = PriceMatrix::from_columns(vec![
        ("AAA", vec![dec!(100), dec!(101)]),
        ("BBB", vec![dec!(50), dec!(52)]),
    ]);
    let stats = compute_return_statistics(&prices).unwrap();
    let err = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MarkowitzError::DegenerateInput(_)));
}

#[test]
fn test_scaled_copy_of_asset_is_degenerate() {
    // CCC moves exactly like AAA, so their returns are identical.
    let prices = PriceMatrix::from_columns(vec![
        ("AAA", vec![dec!(100), dec!(102), dec!(101), dec!(104)]),
        ("BBB", vec![dec!(50), dec!(49), dec!(51), dec!(52)]),
        ("CCC", vec![dec!(10), dec!(10.2), dec!(10.1), dec!(10.4)]),
    ]);
    let stats = compute_return_statistics(&prices).unwrap();
    let err = OptimizerCore::new(
        &stats,
        WeightBoundsPolicy::NoShortSelling,
        SolverSettings::default(),
    )
    .unwrap_err();
    match err {
        MarkowitzError::DegenerateInput(msg) => assert!(msg.contains("CCC"), "{}", msg),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_box_too_tight_for_asset_count_is_rejected() {
    let stats = ReturnStatistics::from_moments(
        vec!["A".into(), "B".into()],
        vec![dec!(0.01), dec!(0.02)],
        vec![vec![dec!(0.0004), dec!(0.0001)], vec![dec!(0.0001), dec!(0.0009)]],
    )
    .unwrap();
    let policy = WeightBoundsPolicy::ShortSelling {
        lower: dec!(-0.2),
        upper: dec!(0.4),
    };
    let err = OptimizerCore::new(&stats, policy, SolverSettings::default()).unwrap_err();
    assert!(matches!(err, MarkowitzError::InvalidInput { .. }));
}
