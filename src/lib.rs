//! # Forecast Ensemble Workspace
//!
//! Facade over the workspace members:
//!
//! - [`forecast_ensemble`]: the weekly multi-model forecasting engine
//! - [`trade_math`]: numeric building blocks it is built on
//!
//! ## Example
//!
//! ```
//! use forecast_ensemble_workspace::forecast_ensemble::level::recover_levels;
//!
//! let levels = recover_levels(100.0, &[Ok(1.0), Ok(2.0)]);
//! assert_eq!(levels, vec![Ok(101.0), Ok(103.0)]);
//! ```

pub use forecast_ensemble;
pub use trade_math;

pub use forecast_ensemble::{
    run_batch, run_symbol, BatchReport, DataLoader, EnsembleConfig, ForecastError, ForecastResult,
    PerformanceRecord, Strategy, SymbolReport,
};
