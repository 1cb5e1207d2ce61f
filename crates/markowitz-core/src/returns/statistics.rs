use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::MarkowitzError;
use crate::linalg::sqrt_decimal;
use crate::types::Rate;
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Price history of a single asset, oldest observation first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Asset identifier (ticker).
    pub asset: String,
    /// Positive, gap-free prices aligned on the matrix date index.
    pub prices: Vec<Decimal>,
}

/// Date-aligned price histories, one column per asset.
///
/// Column order defines the order of every weight vector derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceMatrix {
    pub assets: Vec<PriceSeries>,
    /// Shared observation dates, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<NaiveDate>>,
}

/// Sample moments of simple returns, computed once per price matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub asset_names: Vec<String>,
    /// Time x asset matrix of simple returns. Empty when built from moments.
    pub returns: Vec<Vec<Rate>>,
    /// Per-asset sample mean of `returns`.
    pub mean_returns: Vec<Rate>,
    /// Asset x asset sample covariance (denominator `T - 1`).
    pub covariance_matrix: Vec<Vec<Decimal>>,
    /// Per-asset standard deviation of returns.
    pub volatilities: Vec<Rate>,
}

// ---------------------------------------------------------------------------
// PriceMatrix
// ---------------------------------------------------------------------------

impl PriceMatrix {
    pub fn new(assets: Vec<PriceSeries>) -> Self {
        Self {
            assets,
            dates: None,
        }
    }

    /// Build a matrix from `(asset, prices)` pairs in column order.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Decimal>)>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(asset, prices)| PriceSeries {
                    asset: asset.into(),
                    prices,
                })
                .collect(),
        )
    }

    pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = Some(dates);
        self
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(|s| s.asset.clone()).collect()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Observations per asset (the first column's length).
    pub fn num_observations(&self) -> usize {
        self.assets.first().map(|s| s.prices.len()).unwrap_or(0)
    }

    /// Check the shape invariants the optimizer relies on.
    pub fn validate(&self) -> MarkowitzResult<()> {
        if self.assets.len() < 2 {
            return Err(MarkowitzError::InsufficientData(format!(
                "At least 2 assets required, got {}",
                self.assets.len()
            )));
        }

        let mut seen = HashSet::new();
        for series in &self.assets {
            if series.asset.trim().is_empty() {
                return Err(MarkowitzError::InvalidInput {
                    field: "assets".into(),
                    reason: "Asset identifier must not be empty".into(),
                });
            }
            if !seen.insert(series.asset.as_str()) {
                return Err(MarkowitzError::InvalidInput {
                    field: "assets".into(),
                    reason: format!("Duplicate asset identifier '{}'", series.asset),
                });
            }
            if series.prices.len() < 2 {
                return Err(MarkowitzError::InsufficientData(format!(
                    "Asset '{}' has {} observation(s); at least 2 are required",
                    series.asset,
                    series.prices.len()
                )));
            }
        }

        let expected = self.num_observations();
        for series in &self.assets {
            if series.prices.len() != expected {
                return Err(MarkowitzError::InvalidInput {
                    field: format!("assets[{}].prices", series.asset),
                    reason: format!(
                        "Expected {} observations aligned with '{}' but got {}",
                        expected,
                        self.assets[0].asset,
                        series.prices.len()
                    ),
                });
            }
            if let Some(pos) = series.prices.iter().position(|p| *p <= Decimal::ZERO) {
                return Err(MarkowitzError::InvalidInput {
                    field: format!("assets[{}].prices[{}]", series.asset, pos),
                    reason: "Prices must be strictly positive".into(),
                });
            }
        }

        if let Some(ref dates) = self.dates {
            if dates.len() != expected {
                return Err(MarkowitzError::InvalidInput {
                    field: "dates".into(),
                    reason: format!("Expected {} dates but got {}", expected, dates.len()),
                });
            }
            if dates.windows(2).any(|w| w[0] >= w[1]) {
                return Err(MarkowitzError::InvalidInput {
                    field: "dates".into(),
                    reason: "Dates must be strictly increasing".into(),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReturnStatistics
// ---------------------------------------------------------------------------

impl ReturnStatistics {
    /// Use externally estimated moments instead of a price history.
    pub fn from_moments(
        asset_names: Vec<String>,
        mean_returns: Vec<Rate>,
        covariance_matrix: Vec<Vec<Decimal>>,
    ) -> MarkowitzResult<Self> {
        let n = asset_names.len();
        if n < 2 {
            return Err(MarkowitzError::InsufficientData(format!(
                "At least 2 assets required, got {}",
                n
            )));
        }
        if mean_returns.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "mean_returns".into(),
                reason: format!("Expected {} values but got {}", n, mean_returns.len()),
            });
        }
        validate_covariance_matrix(&covariance_matrix, n)?;

        let volatilities = (0..n).map(|i| sqrt_decimal(covariance_matrix[i][i])).collect();
        Ok(Self {
            asset_names,
            returns: Vec::new(),
            mean_returns,
            covariance_matrix,
            volatilities,
        })
    }

    pub fn num_assets(&self) -> usize {
        self.asset_names.len()
    }

    /// Smallest and largest single-asset mean return.
    pub fn mean_return_bounds(&self) -> (Rate, Rate) {
        let mut lo = self.mean_returns[0];
        let mut hi = self.mean_returns[0];
        for m in &self.mean_returns[1..] {
            if *m < lo {
                lo = *m;
            }
            if *m > hi {
                hi = *m;
            }
        }
        (lo, hi)
    }
}

/// Derive simple returns, their means and sample covariance from prices.
pub fn compute_return_statistics(prices: &PriceMatrix) -> MarkowitzResult<ReturnStatistics> {
    prices.validate()?;

    let n = prices.num_assets();
    let t = prices.num_observations() - 1;

    // returns[row][asset]
    let returns: Vec<Vec<Rate>> = (1..=t)
        .map(|row| {
            prices
                .assets
                .iter()
                .map(|s| s.prices[row] / s.prices[row - 1] - Decimal::ONE)
                .collect()
        })
        .collect();

    let t_dec = Decimal::from(t as i64);
    let mean_returns: Vec<Rate> = (0..n)
        .map(|j| returns.iter().map(|r| r[j]).sum::<Decimal>() / t_dec)
        .collect();

    let mut covariance_matrix = vec![vec![Decimal::ZERO; n]; n];
    if t >= 2 {
        let denom = Decimal::from((t - 1) as i64);
        for i in 0..n {
            for j in i..n {
                let cov: Decimal = returns
                    .iter()
                    .map(|r| (r[i] - mean_returns[i]) * (r[j] - mean_returns[j]))
                    .sum::<Decimal>()
                    / denom;
                covariance_matrix[i][j] = cov;
                covariance_matrix[j][i] = cov;
            }
        }
    } else {
        tracing::warn!(
            observations = t + 1,
            "single return per asset; covariance cannot be estimated and is left at zero"
        );
    }

    let volatilities = (0..n).map(|i| sqrt_decimal(covariance_matrix[i][i])).collect();

    tracing::debug!(assets = n, periods = t, "computed return statistics");

    Ok(ReturnStatistics {
        asset_names: prices.asset_names(),
        returns,
        mean_returns,
        covariance_matrix,
        volatilities,
    })
}

pub(crate) fn validate_covariance_matrix(cov: &[Vec<Decimal>], n: usize) -> MarkowitzResult<()> {
    if cov.len() != n {
        return Err(MarkowitzError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!("Expected {} rows but got {}", n, cov.len()),
        });
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: format!("covariance_matrix[{}]", i),
                reason: format!("Expected {} columns but got {}", n, row.len()),
            });
        }
        if row[i] < Decimal::ZERO {
            return Err(MarkowitzError::InvalidInput {
                field: format!("covariance_matrix[{}][{}]", i, i),
                reason: "Variance must be non-negative".into(),
            });
        }
    }
    let tol = dec!(0.0000000001);
    for i in 0..n {
        for j in (i + 1)..n {
            if (cov[i][j] - cov[j][i]).abs() > tol {
                return Err(MarkowitzError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!("Matrix is not symmetric at ({}, {})", i, j),
                });
            }
        }
    }
    Ok(())
}
