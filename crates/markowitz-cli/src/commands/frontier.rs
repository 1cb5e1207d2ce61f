use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use markowitz_core::config::EngineConfig;
use markowitz_core::frontier::{self, FrontierCurve, SweepRange};
use markowitz_core::optimizer::OptimizerCore;
use markowitz_core::returns::compute_return_statistics;
use markowitz_core::{with_metadata, FrontierAxis};

use super::EngineArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RangeArg {
    /// Lowest to highest asset mean return
    Full,
    /// Minimum-variance return to highest asset mean return
    Efficient,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AxisArg {
    Return,
    Risk,
}

impl From<AxisArg> for FrontierAxis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Return => FrontierAxis::Return,
            AxisArg::Risk => FrontierAxis::Risk,
        }
    }
}

/// Arguments for a frontier sweep
#[derive(Args)]
pub struct FrontierArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Sweep range
    #[arg(long, value_enum, default_value = "full")]
    pub range: RangeArg,

    /// Number of points (defaults to 75 for full, 60 for efficient)
    #[arg(long)]
    pub points: Option<usize>,
}

/// Arguments for a nearest-point lookup
#[derive(Args)]
pub struct NearestArgs {
    #[command(flatten)]
    pub frontier: FrontierArgs,

    /// Axis the value refers to
    #[arg(long, value_enum)]
    pub axis: AxisArg,

    /// Return or risk value to look up, as a decimal
    #[arg(long, allow_hyphen_values = true)]
    pub value: Decimal,
}

pub fn run_frontier(args: FrontierArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let (config, curve) = sweep(&args)?;
    let solves = curve.len() as u32;
    let output = with_metadata(
        "Efficient frontier: minimum variance at evenly spaced target returns",
        &json!({
            "bounds": config.bounds.to_string(),
            "range": curve.range,
            "points": curve.len(),
        }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        solves,
        curve,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_nearest(args: NearestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let (config, curve) = sweep(&args.frontier)?;
    let axis = FrontierAxis::from(args.axis);
    let found = frontier::locate_nearest(&curve, args.value, axis)?;
    let output = with_metadata(
        "Nearest sampled frontier point",
        &json!({
            "bounds": config.bounds.to_string(),
            "range": curve.range,
            "points": curve.len(),
            "axis": axis,
        }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        curve.len() as u32,
        found,
    );
    Ok(serde_json::to_value(output)?)
}

fn sweep(args: &FrontierArgs) -> Result<(EngineConfig, FrontierCurve), Box<dyn std::error::Error>> {
    let mut config = args.engine.load_config()?;
    let stats = compute_return_statistics(&args.engine.load_prices()?)?;
    let core = OptimizerCore::new(&stats, config.bounds, config.solver)?;

    let range = match args.range {
        RangeArg::Full => SweepRange::Full,
        RangeArg::Efficient => SweepRange::FromMinimumVariance {
            min_variance_return: core.minimize_variance()?.expected_return,
        },
    };
    if let Some(points) = args.points {
        match range {
            SweepRange::Full => config.frontier.full_sweep_points = points,
            SweepRange::FromMinimumVariance { .. } => {
                config.frontier.restricted_sweep_points = points
            }
        }
    }

    let curve = frontier::generate_frontier_parallel(&core, &config.frontier, range)?;
    Ok((config, curve))
}
