use clap::Args;
use serde_json::Value;

use markowitz_core::analysis::{self, PortfolioOptimizationInput};

use crate::input;

/// Arguments for a full optimization run
#[derive(Args)]
pub struct OptimizeArgs {
    /// Workflow document: {"prices", "objective", "config", "highlights"}
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let run: PortfolioOptimizationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(text) = input::stdin::read_stdin_text()? {
        serde_json::from_str(&text)?
    } else {
        return Err("--input <file.json> or stdin required for optimize".into());
    };
    let result = analysis::optimize_portfolio(&run)?;
    Ok(serde_json::to_value(result)?)
}
