//! AR(1)-GARCH(1,1) with optional regressors in the mean equation
//!
//! ```text
//! r_t = mu + phi r_{t-1} + sum c_k x_{t,k} + e_t,   e_t ~ N(0, h_t)
//! h_t = omega + alpha e_{t-1}^2 + beta h_{t-1}
//! ```
//!
//! Estimation is two-step: the mean equation by least squares, then the
//! variance recursion by Gaussian quasi-likelihood on the residuals.

use crate::error::{ForecastError, Result};
use crate::models::Regressors;
use serde::Serialize;
use trade_math::optimize::NelderMead;
use trade_math::regression::least_squares;

/// Fewest returns a fit is attempted on
pub const MIN_OBSERVATIONS: usize = 10;

/// Variance equation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GarchParams {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GarchParams {
    /// Conventional starting point for a residual series of variance `var`
    pub fn initial(var: f64) -> Self {
        Self {
            omega: 0.05 * var,
            alpha: 0.05,
            beta: 0.9,
        }
    }

    /// `alpha + beta`
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Map to unconstrained coordinates
    fn to_free(self) -> [f64; 3] {
        let slack = (1.0 - self.alpha - self.beta).max(1e-6);
        [
            self.omega.max(f64::MIN_POSITIVE).ln(),
            (self.alpha.max(1e-6) / slack).ln(),
            (self.beta.max(1e-6) / slack).ln(),
        ]
    }

    /// Map unconstrained coordinates to `omega > 0`, `alpha, beta > 0`, `alpha + beta < 1`
    fn from_free(x: &[f64]) -> Self {
        let (eb, ec) = (x[1].exp(), x[2].exp());
        let denom = 1.0 + eb + ec;
        Self {
            omega: x[0].exp(),
            alpha: eb / denom,
            beta: ec / denom,
        }
    }
}

/// Half the Gaussian negative log-likelihood, constants dropped
fn negative_log_likelihood(residuals: &[f64], params: &GarchParams, h0: f64) -> f64 {
    let mut h = h0;
    let mut total = 0.0;
    for e in residuals {
        if h <= 0.0 || !h.is_finite() {
            return f64::INFINITY;
        }
        total += h.ln() + e * e / h;
        h = params.omega + params.alpha * e * e + params.beta * h;
    }
    0.5 * total
}

/// A fitted AR(1)-GARCH(1,1) model
#[derive(Debug, Clone, Serialize)]
pub struct ArGarchFit {
    intercept: f64,
    ar: f64,
    coefficients: Vec<f64>,
    params: GarchParams,
    last_return: f64,
    /// Variance forecast for the step after the sample
    next_variance: f64,
    log_likelihood: f64,
}

impl ArGarchFit {
    /// Fit on `returns` with regressors aligned to the same timestamps.
    ///
    /// `warm_start` seeds the variance search, typically with the previous
    /// fit of a rolling sequence.
    pub fn fit(
        returns: &[f64],
        regressors: &Regressors,
        warm_start: Option<GarchParams>,
        minimizer: &NelderMead,
    ) -> Result<Self> {
        regressors.ensure_len(returns.len())?;
        let n = returns.len();
        if n < MIN_OBSERVATIONS + regressors.width() {
            return Err(ForecastError::InsufficientData(format!(
                "GARCH needs at least {} returns, have {}",
                MIN_OBSERVATIONS + regressors.width(),
                n
            )));
        }

        let rows: Vec<Vec<f64>> = (1..n)
            .map(|t| {
                let mut row = vec![1.0, returns[t - 1]];
                row.extend(regressors.row(t));
                row
            })
            .collect();
        let mean_fit = least_squares(&rows, &returns[1..])?;
        let residuals = mean_fit.residuals();
        let h0 = residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64;
        let scale = returns.iter().map(|r| r.abs()).fold(0.0, f64::max).max(1.0);
        if !h0.is_finite() || h0 <= 1e-14 * scale * scale {
            return Err(ForecastError::non_convergence(
                "GARCH",
                "residual variance is zero",
            ));
        }

        let start = warm_start
            .filter(|p| p.omega > 0.0 && p.persistence() < 1.0)
            .unwrap_or_else(|| GarchParams::initial(h0));
        let objective =
            |x: &[f64]| negative_log_likelihood(residuals, &GarchParams::from_free(x), h0);
        let min = minimizer
            .minimize(objective, &start.to_free())
            .map_err(|e| ForecastError::non_convergence("GARCH", e))?;
        let params = GarchParams::from_free(&min.point);

        let next_variance = residuals.iter().fold(h0, |h, e| {
            params.omega + params.alpha * e * e + params.beta * h
        });
        let coefficients = mean_fit.coefficients();

        Ok(Self {
            intercept: coefficients[0],
            ar: coefficients[1],
            coefficients: coefficients[2..].to_vec(),
            params,
            last_return: returns[n - 1],
            next_variance,
            log_likelihood: -min.value,
        })
    }

    /// Constant of the mean equation
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Autoregressive coefficient of the mean equation
    pub fn ar_coefficient(&self) -> f64 {
        self.ar
    }

    /// One coefficient per regressor in the mean equation
    pub fn regressor_coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn params(&self) -> GarchParams {
        self.params
    }

    /// Last return of the sample
    pub fn last_return(&self) -> f64 {
        self.last_return
    }

    /// One-step-ahead conditional standard deviation
    pub fn next_volatility(&self) -> f64 {
        self.next_variance.sqrt()
    }

    /// Log-likelihood up to an additive constant
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Conditional mean following `previous`, given this step's regressors
    pub fn mean_after(&self, previous: f64, regressors: &[f64]) -> f64 {
        self.intercept
            + self.ar * previous
            + self
                .coefficients
                .iter()
                .zip(regressors)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    /// One-step-ahead conditional mean of a fit without regressors
    pub fn next_mean(&self) -> f64 {
        self.mean_after(self.last_return, &[])
    }
}
