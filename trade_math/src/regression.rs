//! Multivariate least squares via the normal equations
//!
//! The design matrix is passed row-major (`rows[i][j]` is regressor `j` of
//! observation `i`). No intercept column is added implicitly; callers that want
//! one prepend a `1.0` to each row.

use crate::{MathError, Result};

/// Ridge added to each diagonal entry relative to that column's own scale,
/// so near-collinear designs still solve and rescaling a column leaves the
/// other coefficients unchanged
const RIDGE: f64 = 1e-10;

/// Fitted least squares model
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    coefficients: Vec<f64>,
    residuals: Vec<f64>,
}

impl LeastSquaresFit {
    /// Estimated coefficients, one per design column
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// In-sample residuals `y - X b`
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Residual sum of squares
    pub fn sse(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }

    /// Predict a single design row
    pub fn predict(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row)
    }
}

/// Fit `target ≈ rows · b` by least squares
pub fn least_squares(rows: &[Vec<f64>], target: &[f64]) -> Result<LeastSquaresFit> {
    if rows.len() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            rows.len(),
            target.len()
        )));
    }
    let k = rows.first().map(Vec::len).unwrap_or(0);
    if k == 0 {
        return Err(MathError::InvalidInput(
            "Design matrix has no columns".to_string(),
        ));
    }
    if rows.len() < k {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} observations for {} coefficients, have {}",
            k,
            k,
            rows.len()
        )));
    }
    if rows.iter().any(|r| r.len() != k) {
        return Err(MathError::InvalidInput(
            "Design rows have inconsistent widths".to_string(),
        ));
    }

    // X'X and X'y
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in rows.iter().zip(target) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
    }
    // an all-zero column gets a unit pivot and a zero coefficient
    for (i, row) in xtx.iter_mut().enumerate() {
        let diagonal = row[i];
        row[i] += if diagonal > 0.0 { RIDGE * diagonal } else { 1.0 };
    }

    let coefficients = solve_symmetric(xtx, xty)?;
    let residuals = rows
        .iter()
        .zip(target)
        .map(|(row, y)| y - dot(&coefficients, row))
        .collect();

    Ok(LeastSquaresFit {
        coefficients,
        residuals,
    })
}

/// Solve `a x = b` for symmetric positive definite `a` by Cholesky decomposition
pub fn solve_symmetric(a: Vec<Vec<f64>>, b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for p in 0..j {
                sum -= l[i][p] * l[j][p];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(MathError::CalculationError(
                        "Matrix is not positive definite".to_string(),
                    ));
                }
                l[i][i] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // forward then backward substitution
    let mut z = vec![0.0; n];
    for i in 0..n {
        let s: f64 = (0..i).map(|p| l[i][p] * z[p]).sum();
        z[i] = (b[i] - s) / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|p| l[p][i] * x[p]).sum();
        x[i] = (z[i] - s) / l[i][i];
    }
    Ok(x)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
