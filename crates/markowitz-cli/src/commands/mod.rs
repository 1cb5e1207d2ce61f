pub mod frontier;
pub mod optimize;
pub mod solve;

use clap::Args;
use rust_decimal::Decimal;

use markowitz_core::config::EngineConfig;
use markowitz_core::optimizer::WeightBoundsPolicy;
use markowitz_core::returns::PriceMatrix;

use crate::input;

/// Price source and engine settings shared by the solver subcommands.
#[derive(Args)]
pub struct EngineArgs {
    /// Price matrix as JSON ({"assets": [{"asset", "prices"}], "dates"})
    #[arg(long)]
    pub input: Option<String>,
    /// Price table as CSV (date,<ticker>,...)
    #[arg(long, conflicts_with = "input")]
    pub prices: Option<String>,
    /// Engine configuration file (JSON or YAML)
    #[arg(long)]
    pub config: Option<String>,
    /// Allow short positions within [-1, 1]
    #[arg(long)]
    pub short_selling: bool,
    /// Override solver.max_iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,
    /// Override solver.tolerance
    #[arg(long)]
    pub tolerance: Option<Decimal>,
}

impl EngineArgs {
    pub fn load_prices(&self) -> Result<PriceMatrix, Box<dyn std::error::Error>> {
        let prices = self.read_prices()?;
        tracing::debug!(
            assets = prices.num_assets(),
            observations = prices.num_observations(),
            "loaded price matrix"
        );
        Ok(prices)
    }

    fn read_prices(&self) -> Result<PriceMatrix, Box<dyn std::error::Error>> {
        if let Some(ref path) = self.prices {
            input::prices_csv::read_prices_csv(path)
        } else if let Some(ref path) = self.input {
            input::file::read_json(path)
        } else if let Some(text) = input::stdin::read_stdin_text()? {
            if text.starts_with('{') {
                Ok(serde_json::from_str(&text)?)
            } else {
                input::prices_csv::parse_prices_csv(text.as_bytes())
            }
        } else {
            Err("--prices <file.csv>, --input <file.json> or stdin required".into())
        }
    }

    pub fn load_config(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config {
            Some(ref path) => input::config::read_config(path)?,
            None => EngineConfig::default(),
        };
        if self.short_selling {
            config.bounds = WeightBoundsPolicy::short_selling();
        }
        if let Some(max_iterations) = self.max_iterations {
            config.solver.max_iterations = max_iterations;
        }
        if let Some(tolerance) = self.tolerance {
            config.solver.tolerance = tolerance;
        }
        config.validate()?;
        Ok(config)
    }
}
