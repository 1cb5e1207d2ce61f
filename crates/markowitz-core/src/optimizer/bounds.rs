use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MarkowitzError;
use crate::types::Rate;
use crate::MarkowitzResult;

/// Feasible region for individual portfolio weights.
///
/// Every policy is a finite box `[lower, upper]` applied to each weight, on top
/// of the budget constraint `sum(w) = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeightBoundsPolicy {
    /// Long-only: each weight in `[0, 1]`.
    NoShortSelling,
    /// Negative weights allowed within `[lower, upper]` (default `[-1, 1]`).
    ShortSelling {
        #[serde(default = "default_short_lower")]
        lower: Rate,
        #[serde(default = "default_short_upper")]
        upper: Rate,
    },
}

fn default_short_lower() -> Rate {
    dec!(-1)
}

fn default_short_upper() -> Rate {
    dec!(1)
}

impl Default for WeightBoundsPolicy {
    fn default() -> Self {
        WeightBoundsPolicy::NoShortSelling
    }
}

impl fmt::Display for WeightBoundsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = self.bounds();
        match self {
            WeightBoundsPolicy::NoShortSelling => write!(f, "no short selling [{}, {}]", lo, hi),
            WeightBoundsPolicy::ShortSelling { .. } => {
                write!(f, "short selling [{}, {}]", lo, hi)
            }
        }
    }
}

impl WeightBoundsPolicy {
    /// Short selling with the default `[-1, 1]` box.
    pub fn short_selling() -> Self {
        WeightBoundsPolicy::ShortSelling {
            lower: default_short_lower(),
            upper: default_short_upper(),
        }
    }

    pub fn from_allow_short(allow_short: bool) -> Self {
        if allow_short {
            Self::short_selling()
        } else {
            WeightBoundsPolicy::NoShortSelling
        }
    }

    /// `(lower, upper)` bound applied to every weight.
    pub fn bounds(&self) -> (Rate, Rate) {
        match *self {
            WeightBoundsPolicy::NoShortSelling => (Decimal::ZERO, Decimal::ONE),
            WeightBoundsPolicy::ShortSelling { lower, upper } => (lower, upper),
        }
    }

    pub fn allows_short(&self) -> bool {
        self.bounds().0 < Decimal::ZERO
    }

    /// The box must hold the equal-weight portfolio strictly inside, since it
    /// is the solver's starting point.
    pub fn validate(&self, n_assets: usize) -> MarkowitzResult<()> {
        let (lo, hi) = self.bounds();
        if lo >= hi {
            return Err(MarkowitzError::InvalidInput {
                field: "bounds".into(),
                reason: format!("lower bound {} must be below upper bound {}", lo, hi),
            });
        }
        if n_assets == 0 {
            return Err(MarkowitzError::InsufficientData(
                "At least one asset required".into(),
            ));
        }
        let equal = Decimal::ONE / Decimal::from(n_assets as i64);
        if equal <= lo || equal >= hi {
            return Err(MarkowitzError::InvalidInput {
                field: "bounds".into(),
                reason: format!(
                    "[{}, {}] cannot hold a fully invested {}-asset portfolio (equal weight {})",
                    lo,
                    hi,
                    n_assets,
                    equal.round_dp(6)
                ),
            });
        }
        Ok(())
    }

    /// Whether every weight lies inside the box, up to `tol`.
    pub fn contains(&self, weights: &[Rate], tol: Decimal) -> bool {
        let (lo, hi) = self.bounds();
        weights.iter().all(|w| *w >= lo - tol && *w <= hi + tol)
    }

    /// Vertex of the feasible region that maximizes (or minimizes) `w . mean`.
    ///
    /// Greedy fill: every weight starts at the lower bound and the remaining
    /// budget goes to the best assets first, capped at the upper bound. Ties
    /// keep column order.
    pub(crate) fn extreme_portfolio(&self, mean: &[Rate], maximize: bool) -> Vec<Rate> {
        let (lo, hi) = self.bounds();
        let n = mean.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let ord = mean[a].cmp(&mean[b]);
            if maximize {
                ord.reverse()
            } else {
                ord
            }
        });

        let mut w = vec![lo; n];
        let mut budget = Decimal::ONE - lo * Decimal::from(n as i64);
        for i in order {
            if budget <= Decimal::ZERO {
                break;
            }
            let add = budget.min(hi - lo);
            w[i] += add;
            budget -= add;
        }
        w
    }
}
