//! Accuracy metrics for forecasts against realised levels

use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, Strategy};
use serde::Serialize;

/// Accuracy of one strategy on one symbol.
///
/// Unavailable forecast points are left out of both means and counted in
/// `excluded`. A point whose actual value is zero has no percentage error and
/// only enters the MSE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub symbol: String,
    pub strategy: Strategy,
    /// Mean Absolute Percentage Error, in percent
    pub mape: Option<f64>,
    /// Mean Squared Error
    pub mse: Option<f64>,
    /// Points that entered the MSE
    pub evaluated: usize,
    /// Unavailable points left out
    pub excluded: usize,
}

impl PerformanceRecord {
    /// Whether any point could be evaluated
    pub fn is_defined(&self) -> bool {
        self.evaluated > 0
    }
}

impl std::fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<f64>, suffix: &str| match v {
            Some(v) => format!("{:.4}{}", v, suffix),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "{} {:<8} MAPE: {:>10}  MSE: {:>12}  ({} evaluated, {} excluded)",
            self.symbol,
            self.strategy.label(),
            show(self.mape, "%"),
            show(self.mse, ""),
            self.evaluated,
            self.excluded
        )
    }
}

/// Score `forecast` against `actual`, which must cover the same dates
pub fn evaluate(
    symbol: &str,
    strategy: Strategy,
    forecast: &ForecastResult,
    actual: &[f64],
) -> Result<PerformanceRecord> {
    if forecast.len() != actual.len() {
        return Err(ForecastError::AlignmentMismatch(format!(
            "{} forecast has {} points for {} actual values",
            strategy,
            forecast.len(),
            actual.len()
        )));
    }

    let mut squared = 0.0;
    let mut percentage = 0.0;
    let mut evaluated = 0;
    let mut with_percentage = 0;
    let mut excluded = 0;

    for (point, truth) in forecast.points().iter().zip(actual) {
        let Ok(value) = point else {
            excluded += 1;
            continue;
        };
        let error = value - truth;
        squared += error * error;
        evaluated += 1;
        if *truth != 0.0 {
            percentage += (error / truth).abs();
            with_percentage += 1;
        }
    }

    Ok(PerformanceRecord {
        symbol: symbol.to_string(),
        strategy,
        mape: (with_percentage > 0).then(|| percentage / with_percentage as f64 * 100.0),
        mse: (evaluated > 0).then(|| squared / evaluated as f64),
        evaluated,
        excluded,
    })
}
