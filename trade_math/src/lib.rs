//! # Trade Math
//!
//! Numeric building blocks shared by the forecasting engine.
//!
//! The crate deliberately knows nothing about forecasting strategies. It provides:
//! - streaming indicators used to engineer features (SMA, RSI)
//! - differencing and its inverse
//! - descriptive statistics, empirical quantiles and quantile clipping
//! - multivariate least squares
//! - a bounded Nelder-Mead minimiser for likelihood and sum-of-squares fits

use thiserror::Error;

pub mod differencing;
pub mod moving_averages;
pub mod optimize;
pub mod oscillators;
pub mod regression;
pub mod statistics;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Minimiser did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
