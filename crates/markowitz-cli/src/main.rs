mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use markowitz_core::MarkowitzError;

use commands::frontier::{FrontierArgs, NearestArgs};
use commands::optimize::OptimizeArgs;
use commands::solve::{RiskBudgetArgs, TargetReturnArgs};
use commands::EngineArgs;

/// Mean-variance portfolio optimization
#[derive(Parser)]
#[command(
    name = "markowitz",
    version,
    about = "Mean-variance portfolio optimization",
    long_about = "A CLI for Markowitz mean-variance portfolio optimization with decimal \
                  precision. Computes minimum-variance, target-return and risk-budget \
                  portfolios, efficient frontiers, and nearest frontier points from \
                  historical prices."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full optimization from a workflow JSON document
    Optimize(OptimizeArgs),
    /// Mean returns, covariance and volatilities of the price history
    Stats(EngineArgs),
    /// Global minimum-variance portfolio
    MinVariance(EngineArgs),
    /// Minimum-variance portfolio for a target return
    TargetReturn(TargetReturnArgs),
    /// Maximum-return portfolio for a risk budget
    RiskBudget(RiskBudgetArgs),
    /// Sample the efficient frontier
    Frontier(FrontierArgs),
    /// Frontier point nearest to a return or risk value
    Nearest(NearestArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Stats(args) => commands::solve::run_stats(args),
        Commands::MinVariance(args) => commands::solve::run_min_variance(args),
        Commands::TargetReturn(args) => commands::solve::run_target_return(args),
        Commands::RiskBudget(args) => commands::solve::run_risk_budget(args),
        Commands::Frontier(args) => commands::frontier::run_frontier(args),
        Commands::Nearest(args) => commands::frontier::run_nearest(args),
        Commands::Version => {
            println!("markowitz {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            if let Some(hint) = e.downcast_ref::<MarkowitzError>().and_then(|m| m.hint()) {
                eprintln!("{}: {}", "hint".yellow().bold(), hint);
            }
            process::exit(1);
        }
    }
}
