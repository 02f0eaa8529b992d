//! Feature engineering for daily bars and their weekly aggregation
//!
//! Raw bars carry `open`, `high`, `low`, `close`, `volume` and optionally
//! `adjusted`. Derived columns keep their warm-up rows as nulls; callers drop
//! incomplete rows before fitting.

use crate::calendar::week_buckets;
use crate::data::FeatureFrame;
use crate::error::{ForecastError, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use trade_math::differencing::difference_aligned;
use trade_math::moving_averages::rolling_mean;
use trade_math::oscillators::rsi_series;

/// Indicator periods used when deriving features from raw bars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSpec {
    /// Short simple moving average period
    pub sma_short: usize,
    /// Long simple moving average period
    pub sma_long: usize,
    /// RSI period
    pub rsi_period: usize,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            sma_short: 10,
            sma_long: 30,
            rsi_period: 14,
        }
    }
}

/// Regressor columns consumed by the forecasting strategies by default
pub const DEFAULT_REGRESSORS: [&str; 4] =
    ["sma_short_diff", "sma_long_diff", "rsi_diff", "volume_diff"];

/// Derive returns, moving averages, RSI and first differences from daily bars
pub fn build_daily_features(bars: &FeatureFrame, spec: &FeatureSpec) -> Result<FeatureFrame> {
    if spec.sma_short == 0 || spec.sma_long == 0 || spec.rsi_period == 0 {
        return Err(ForecastError::InvalidParameter(
            "indicator periods must be greater than zero".to_string(),
        ));
    }

    let close = bars.required_column("close")?;
    let volume = bars.required_column("volume")?;

    let returns: Vec<Option<f64>> = std::iter::once(None)
        .chain(close.windows(2).map(|w| {
            if w[0] != 0.0 {
                Some(w[1] / w[0] - 1.0)
            } else {
                None
            }
        }))
        .collect();
    let close_opt: Vec<Option<f64>> = close.iter().copied().map(Some).collect();
    let volume_opt: Vec<Option<f64>> = volume.iter().copied().map(Some).collect();
    let sma_short = rolling_mean(&close, spec.sma_short)?;
    let sma_long = rolling_mean(&close, spec.sma_long)?;
    let rsi = rsi_series(&close, spec.rsi_period)?;

    let mut frame = bars.clone();
    if !frame.has_column("adjusted") {
        frame = frame.with_column("adjusted", close_opt.clone())?;
    }

    frame
        .with_column("return", returns)?
        .with_column("close_diff", difference_aligned(&close_opt))?
        .with_column("sma_short_diff", difference_aligned(&sma_short))?
        .with_column("sma_long_diff", difference_aligned(&sma_long))?
        .with_column("rsi_diff", difference_aligned(&rsi))?
        .with_column("volume_diff", difference_aligned(&volume_opt))?
        .with_column("sma_short", sma_short)?
        .with_column("sma_long", sma_long)?
        .with_column("rsi", rsi)
}

/// How a daily column is reduced to one weekly value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeeklyReduction {
    First,
    Last,
    Max,
    Min,
    Sum,
    Mean,
}

impl WeeklyReduction {
    /// Reduction rule for a column name
    pub fn for_column(name: &str) -> Self {
        match name {
            "open" => WeeklyReduction::First,
            "high" => WeeklyReduction::Max,
            "low" => WeeklyReduction::Min,
            "volume" => WeeklyReduction::Sum,
            "return" => WeeklyReduction::Mean,
            n if n.ends_with("_diff") => WeeklyReduction::Mean,
            _ => WeeklyReduction::Last,
        }
    }

    /// Reduce the defined values of one week; `None` if the week has none
    pub fn apply(&self, values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
        let mut defined = values.flatten().peekable();
        defined.peek()?;
        match self {
            WeeklyReduction::First => defined.next(),
            WeeklyReduction::Last => defined.last(),
            WeeklyReduction::Max => defined.reduce(f64::max),
            WeeklyReduction::Min => defined.reduce(f64::min),
            WeeklyReduction::Sum => Some(defined.sum()),
            WeeklyReduction::Mean => {
                let (sum, count) = defined.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                Some(sum / count as f64)
            }
        }
    }
}

/// Aggregate a daily frame to weekly rows keyed by week start.
///
/// `close_diff` is recomputed from the weekly closes so that cumulating it
/// reproduces the weekly close series.
pub fn weekly_from_daily(daily: &FeatureFrame, week_start: Weekday) -> Result<FeatureFrame> {
    let buckets = week_buckets(daily.dates(), week_start);
    let weeks = buckets.iter().map(|(week, _)| *week).collect();

    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for name in daily.column_names() {
        let values = daily.column(&name)?;
        let rule = WeeklyReduction::for_column(&name);
        let weekly = buckets
            .iter()
            .map(|(_, members)| rule.apply(members.iter().map(|&idx| values[idx])))
            .collect();
        columns.push((name, weekly));
    }

    if let Some(close) = columns
        .iter()
        .find(|(name, _)| name == "close")
        .map(|(_, values)| difference_aligned(values))
    {
        match columns.iter_mut().find(|(name, _)| name == "close_diff") {
            Some((_, values)) => *values = close,
            None => columns.push(("close_diff".to_string(), close)),
        }
    }

    FeatureFrame::from_columns(
        weeks,
        columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.clone()))
            .collect(),
    )
}
