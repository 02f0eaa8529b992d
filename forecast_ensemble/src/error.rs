//! Error types for the forecast_ensemble crate

use polars::prelude::PolarsError;
use thiserror::Error;
use trade_math::MathError;

/// Custom error types for the forecast_ensemble crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A required train or test window is empty or too short
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error related to forecasting operations
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// A model fit did not converge
    #[error("{model} did not converge: {reason}")]
    NonConvergence { model: String, reason: String },

    /// Forecast series reaching the combiner are not on the same index
    #[error("Alignment mismatch: {0}")]
    AlignmentMismatch(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the numeric layer
    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

impl From<smartcore::error::Failed> for ForecastError {
    fn from(err: smartcore::error::Failed) -> Self {
        ForecastError::ForecastingError(format!("tree learner failed: {}", err))
    }
}

impl ForecastError {
    /// Wrap a failed fit as a non-convergence of `model`
    pub fn non_convergence(model: impl Into<String>, reason: impl ToString) -> Self {
        ForecastError::NonConvergence {
            model: model.into(),
            reason: reason.to_string(),
        }
    }
}
