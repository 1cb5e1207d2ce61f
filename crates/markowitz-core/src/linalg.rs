//! Dense decimal linear algebra used by the returns and optimizer modules.
//!
//! Matrices are row-major `Vec<Vec<Decimal>>`; dimensions are small (one row
//! per asset), so plain Gaussian elimination is sufficient.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

pub(crate) fn vec_dot(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

pub(crate) fn mat_vec_multiply(mat: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// `w' * sigma * w`
pub(crate) fn quadratic_form(w: &[Decimal], sigma: &[Vec<Decimal>]) -> Decimal {
    vec_dot(w, &mat_vec_multiply(sigma, w))
}

/// Portfolio standard deviation. Rounding noise below zero is clamped.
pub(crate) fn portfolio_std(w: &[Decimal], sigma: &[Vec<Decimal>]) -> Decimal {
    sqrt_decimal(quadratic_form(w, sigma))
}

pub(crate) fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

pub(crate) fn max_abs(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .map(|v| v.abs())
        .fold(Decimal::ZERO, |acc, v| if v > acc { v } else { acc })
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below `rel_tol` times the largest
/// absolute entry of `a`.
pub(crate) fn solve_linear_system(
    mut a: Vec<Vec<Decimal>>,
    mut b: Vec<Decimal>,
    rel_tol: Decimal,
) -> Option<Vec<Decimal>> {
    let n = b.len();
    if n == 0 {
        return Some(Vec::new());
    }
    let scale = max_abs(a.iter().flat_map(|row| row.iter().copied()));
    if scale.is_zero() {
        return None;
    }
    let threshold = scale * rel_tol;

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = a[col][col].abs();
        for (row, r) in a.iter().enumerate().skip(col + 1) {
            let val = r[col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }
        if max_val <= threshold {
            return None;
        }
        if max_row != col {
            a.swap(col, max_row);
            b.swap(col, max_row);
        }

        let pivot = a[col][col];
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot;
            if factor.is_zero() {
                continue;
            }
            for k in col..n {
                let delta = factor * a[col][k];
                a[row][k] -= delta;
            }
            let delta = factor * b[col];
            b[row] -= delta;
        }
    }

    let mut x = vec![Decimal::ZERO; n];
    for row in (0..n).rev() {
        let tail: Decimal = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Symmetric elimination (LDL') on a unit-diagonal matrix without pivoting.
///
/// Returns the index of the first pivot at or below `tol`, i.e. the first
/// column that is numerically a linear combination of the columns before it.
pub(crate) fn first_singular_pivot(corr: &[Vec<Decimal>], tol: Decimal) -> Option<usize> {
    let n = corr.len();
    let mut l = vec![vec![Decimal::ZERO; n]; n];
    let mut d = vec![Decimal::ZERO; n];

    for j in 0..n {
        let acc: Decimal = (0..j).map(|k| l[j][k] * l[j][k] * d[k]).sum();
        d[j] = corr[j][j] - acc;
        if d[j] <= tol {
            return Some(j);
        }
        for i in (j + 1)..n {
            let acc: Decimal = (0..j).map(|k| l[i][k] * l[j][k] * d[k]).sum();
            l[i][j] = (corr[i][j] - acc) / d[j];
        }
    }
    None
}

/// `n` equally spaced values from `start` to `end`, both inclusive.
pub(crate) fn linspace(start: Decimal, end: Decimal, n: usize) -> Vec<Decimal> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / Decimal::from((n - 1) as i64);
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        start + step * Decimal::from(i as i64)
                    }
                })
                .collect()
        }
    }
}
