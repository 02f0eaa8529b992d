//! # Forecast Ensemble
//!
//! Weekly multi-model forecasting of financial time series.
//!
//! ## Features
//!
//! - Feature tables at daily and weekly granularity (polars backed)
//! - Automatic ARIMA with external regressors on the differenced target
//! - Neural network autoregression averaged over seeded repeats
//! - Recursive gradient-boosted trees forecasting levels directly
//! - Rolling AR(1)-GARCH(1,1) refits driving a seeded Monte Carlo simulation
//! - Forecasts of the external regressors matched to each consuming model
//! - Equal-weight ensemble on a common weekly index, scored with MAPE and MSE
//!
//! Point forecasts are [`PointForecast`] values: a number, or the typed reason
//! it could not be produced. A failed fit therefore never aborts a run; it
//! shows up as unavailable points wherever it matters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_ensemble::{prepare_inputs, run_batch, DataLoader, EnsembleConfig};
//!
//! let config = EnsembleConfig::from_toml_file("ensemble.toml")?;
//! let (symbols, unreadable) = prepare_inputs(DataLoader::from_dir("data")?, None);
//!
//! let batch = run_batch(&symbols, &config).with_skipped(unreadable);
//! for record in batch.records() {
//!     println!("{}", record);
//! }
//! # Ok::<(), forecast_ensemble::ForecastError>(())
//! ```

pub mod calendar;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod exogenous;
pub mod features;
pub mod level;
pub mod metrics;
pub mod models;
pub mod monte_carlo;
pub mod pipeline;

// Re-export commonly used types
pub use crate::config::EnsembleConfig;
pub use crate::data::{DataLoader, FeatureFrame, Split, TimeSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::PerformanceRecord;
pub use crate::models::{
    ForecastModel, ForecastResult, PointForecast, Strategy, TrainedForecastModel, Unavailable,
};
pub use crate::pipeline::{
    prepare_inputs, run_batch, run_symbol, split_frames, BatchReport, SkippedSymbol, SymbolReport,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
