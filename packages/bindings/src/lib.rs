use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use markowitz_core::config::EngineConfig;
use markowitz_core::frontier::{self, SweepRange};
use markowitz_core::optimizer::OptimizerCore;
use markowitz_core::returns::{compute_return_statistics, PriceMatrix};
use markowitz_core::{FrontierAxis, MarkowitzError};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine errors keep their hint in the reason string.
fn engine_error(e: MarkowitzError) -> napi::Error {
    napi::Error::from_reason(e.with_hint())
}

/// Prices plus optional engine configuration, shared by the single-solve
/// entry points.
#[derive(Deserialize)]
struct EngineRequest {
    prices: PriceMatrix,
    #[serde(default)]
    config: EngineConfig,
}

#[derive(Deserialize)]
struct TargetRequest {
    #[serde(flatten)]
    engine: EngineRequest,
    target: Decimal,
}

#[derive(Deserialize)]
struct RiskBudgetRequest {
    #[serde(flatten)]
    engine: EngineRequest,
    risk: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RangeRequest {
    Full,
    Efficient,
}

#[derive(Deserialize)]
struct FrontierRequest {
    #[serde(flatten)]
    engine: EngineRequest,
    #[serde(default = "default_range")]
    range: RangeRequest,
    /// When set, also return the point nearest to this value.
    #[serde(default)]
    nearest: Option<NearestRequest>,
}

#[derive(Deserialize)]
struct NearestRequest {
    axis: FrontierAxis,
    value: Decimal,
}

fn default_range() -> RangeRequest {
    RangeRequest::Full
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_portfolio(input_json: String) -> NapiResult<String> {
    let input: markowitz_core::analysis::PortfolioOptimizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = markowitz_core::analysis::optimize_portfolio(&input).map_err(engine_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

#[napi]
pub fn return_statistics(prices_json: String) -> NapiResult<String> {
    let prices: PriceMatrix = serde_json::from_str(&prices_json).map_err(to_napi_error)?;
    let stats = compute_return_statistics(&prices).map_err(engine_error)?;
    serde_json::to_string(&stats).map_err(to_napi_error)
}

#[napi]
pub fn min_variance(input_json: String) -> NapiResult<String> {
    let req: EngineRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let stats = compute_return_statistics(&req.prices).map_err(engine_error)?;
    let core =
        OptimizerCore::new(&stats, req.config.bounds, req.config.solver).map_err(engine_error)?;
    let output = core.minimize_variance().map_err(engine_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn min_variance_for_target_return(input_json: String) -> NapiResult<String> {
    let req: TargetRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let stats = compute_return_statistics(&req.engine.prices).map_err(engine_error)?;
    let core = OptimizerCore::new(&stats, req.engine.config.bounds, req.engine.config.solver)
        .map_err(engine_error)?;
    let output = core
        .minimize_variance_for_target_return(req.target)
        .map_err(engine_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn max_return_for_risk_budget(input_json: String) -> NapiResult<String> {
    let req: RiskBudgetRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let stats = compute_return_statistics(&req.engine.prices).map_err(engine_error)?;
    let core = OptimizerCore::new(&stats, req.engine.config.bounds, req.engine.config.solver)
        .map_err(engine_error)?;
    let mv = core.minimize_variance().map_err(engine_error)?;
    let output = core
        .maximize_return_for_risk_budget(req.risk, &mv)
        .map_err(engine_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn efficient_frontier(input_json: String) -> NapiResult<String> {
    let req: FrontierRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let config = req.engine.config;
    let stats = compute_return_statistics(&req.engine.prices).map_err(engine_error)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver).map_err(engine_error)?;
    let range = match req.range {
        RangeRequest::Full => SweepRange::Full,
        RangeRequest::Efficient => SweepRange::FromMinimumVariance {
            min_variance_return: core.minimize_variance().map_err(engine_error)?.expected_return,
        },
    };
    let curve = frontier::generate_frontier_parallel(&core, &config.frontier, range)
        .map_err(engine_error)?;
    let nearest = match req.nearest {
        Some(n) => Some(frontier::locate_nearest(&curve, n.value, n.axis).map_err(engine_error)?),
        None => None,
    };
    serde_json::to_string(&serde_json::json!({
        "frontier": curve,
        "nearest": nearest,
    }))
    .map_err(to_napi_error)
}
