use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use markowitz_core::analysis::summarize;
use markowitz_core::optimizer::{OptimizationResult, OptimizerCore};
use markowitz_core::returns::{compute_return_statistics, ReturnStatistics};
use markowitz_core::with_metadata;

use super::EngineArgs;

/// Arguments for a target-return solve
#[derive(Args)]
pub struct TargetReturnArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Target expected return per period as a decimal (e.g. 0.001)
    #[arg(long, allow_hyphen_values = true)]
    pub target: Decimal,
}

/// Arguments for a risk-budget solve
#[derive(Args)]
pub struct RiskBudgetArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Risk budget (standard deviation per period) as a decimal (e.g. 0.012)
    #[arg(long)]
    pub risk: Decimal,
}

pub fn run_stats(args: EngineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let prices = args.load_prices()?;
    let stats = compute_return_statistics(&prices)?;
    let result = json!({
        "asset_names": stats.asset_names,
        "observations": prices.num_observations(),
        "mean_returns": stats.mean_returns,
        "volatilities": stats.volatilities,
        "covariance_matrix": stats.covariance_matrix,
    });
    let output = with_metadata(
        "Simple returns, sample mean and sample covariance (T - 1)",
        &json!({ "n_assets": stats.num_assets() }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        0,
        result,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_min_variance(args: EngineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let config = args.load_config()?;
    let stats = compute_return_statistics(&args.load_prices()?)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver)?;
    let res = core.minimize_variance()?;
    portfolio_output(
        "Global minimum-variance portfolio",
        &core,
        &stats,
        &res,
        json!({}),
        start,
    )
}

pub fn run_target_return(args: TargetReturnArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let config = args.engine.load_config()?;
    let stats = compute_return_statistics(&args.engine.load_prices()?)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver)?;
    let res = core.minimize_variance_for_target_return(args.target)?;
    portfolio_output(
        "Minimum-variance portfolio for a target return",
        &core,
        &stats,
        &res,
        json!({ "target_return": args.target.to_string() }),
        start,
    )
}

pub fn run_risk_budget(args: RiskBudgetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let config = args.engine.load_config()?;
    let stats = compute_return_statistics(&args.engine.load_prices()?)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver)?;
    let mv = core.minimize_variance()?;
    let res = core.maximize_return_for_risk_budget(args.risk, &mv)?;
    portfolio_output(
        "Maximum-return portfolio for a risk budget",
        &core,
        &stats,
        &res,
        json!({ "risk_budget": args.risk.to_string() }),
        start,
    )
}

fn portfolio_output(
    methodology: &str,
    core: &OptimizerCore<'_>,
    stats: &ReturnStatistics,
    res: &OptimizationResult,
    mut assumptions: Value,
    start: Instant,
) -> Result<Value, Box<dyn std::error::Error>> {
    if let Value::Object(ref mut map) = assumptions {
        map.insert("n_assets".into(), json!(stats.num_assets()));
        map.insert("bounds".into(), json!(core.policy().to_string()));
        map.insert("iterations".into(), json!(res.iterations));
    }
    let output = with_metadata(
        methodology,
        &assumptions,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        res.solves,
        summarize(stats, res),
    );
    Ok(serde_json::to_value(output)?)
}
