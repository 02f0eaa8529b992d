//! Per-symbol orchestration and the batch runner
//!
//! For one symbol the daily feature frame is aggregated to weeks, both
//! frequencies are split independently, and the four strategies run
//! concurrently on an immutable configuration snapshot. A strategy that fails
//! as a whole is reported as unavailable at every week; a symbol whose data
//! cannot be split is skipped without stopping the batch.

use crate::config::EnsembleConfig;
use crate::data::{FeatureFrame, Split};
use crate::ensemble::{align_to_index, combine};
use crate::error::{ForecastError, Result};
use crate::exogenous::{ExogenousForecaster, Technique};
use crate::calendar::complete_week_cutoff;
use crate::features::{build_daily_features, weekly_from_daily, FeatureSpec};
use crate::level::recover_levels;
use crate::metrics::{evaluate, PerformanceRecord};
use crate::models::arima::AutoArima;
use crate::models::neural::NeuralAutoregression;
use crate::models::trees::RecursiveTreeForecaster;
use crate::models::{fit_forecast, ForecastResult, PointForecast, Regressors, Strategy, Unavailable};
use crate::monte_carlo::{MonteCarloEngine, MonteCarloForecast};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Everything produced for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    /// Week starts of the weekly test window
    pub weeks: Vec<NaiveDate>,
    /// Realised weekly levels
    pub actual: Vec<f64>,
    /// One weekly forecast per component strategy plus the ensemble
    pub forecasts: BTreeMap<Strategy, ForecastResult>,
    /// Daily Monte Carlo mean and band, when the engine ran
    pub monte_carlo: Option<MonteCarloForecast>,
    /// Monte Carlo weeks that fell outside the weekly test index
    pub dropped_weeks: Vec<NaiveDate>,
    pub records: Vec<PerformanceRecord>,
}

impl SymbolReport {
    /// Forecast of one strategy
    pub fn forecast(&self, strategy: Strategy) -> Option<&ForecastResult> {
        self.forecasts.get(&strategy)
    }

    /// Performance row of one strategy
    pub fn record(&self, strategy: Strategy) -> Option<&PerformanceRecord> {
        self.records.iter().find(|r| r.strategy == strategy)
    }
}

/// A symbol left out of the batch and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Results of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub reports: Vec<SymbolReport>,
    pub skipped: Vec<SkippedSymbol>,
}

impl BatchReport {
    /// Performance rows of every symbol, in symbol order
    pub fn records(&self) -> Vec<&PerformanceRecord> {
        self.reports.iter().flat_map(|r| r.records.iter()).collect()
    }

    /// Merge symbols skipped before the batch ran, keeping symbol order
    pub fn with_skipped(mut self, earlier: Vec<SkippedSymbol>) -> Self {
        self.skipped.extend(earlier);
        self.skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        self
    }
}

/// Training data of the weekly strategies
struct WeeklyInputs {
    levels: Vec<f64>,
    differences: Vec<f64>,
    regressors: Regressors,
    anchor: f64,
}

impl WeeklyInputs {
    fn from_split(split: &Split, config: &EnsembleConfig) -> Result<Self> {
        let columns = &config.columns;
        let levels = split.train.required_column(&columns.level)?;
        let anchor = *levels.last().ok_or_else(|| {
            ForecastError::InsufficientData("weekly training window is empty".to_string())
        })?;
        let regressors = Regressors::new(
            columns.regressors.clone(),
            columns
                .regressors
                .iter()
                .map(|name| split.train.required_column(name))
                .collect::<Result<Vec<_>>>()?,
        )?;

        Ok(Self {
            differences: split.train.required_column(&columns.difference)?,
            levels,
            regressors,
            anchor,
        })
    }
}

/// Turn a strategy's outcome into a weekly result, marking a failed strategy
/// unavailable at every week
fn settle(
    strategy: Strategy,
    weeks: &[NaiveDate],
    outcome: Result<Vec<PointForecast>>,
) -> Result<ForecastResult> {
    match outcome {
        Ok(points) => ForecastResult::new(weeks.to_vec(), points),
        Err(e) => {
            warn!(%strategy, error = %e, "strategy unavailable");
            ForecastResult::unavailable(
                weeks.to_vec(),
                Unavailable::FitFailed {
                    model: strategy.label().to_string(),
                    reason: e.to_string(),
                },
            )
        }
    }
}

fn run_arimax(inputs: &WeeklyInputs, horizon: usize, config: &EnsembleConfig) -> Result<Vec<PointForecast>> {
    let future = ExogenousForecaster::new(Technique::AutoArima, config)
        .forecast_all(&inputs.regressors, horizon)?;
    let model = AutoArima::new(config.arima, config.minimizer()?);
    let diffs = fit_forecast(&model, &inputs.differences, &inputs.regressors, horizon, &future)?;
    Ok(recover_levels(inputs.anchor, &diffs))
}

fn run_neural(inputs: &WeeklyInputs, horizon: usize, config: &EnsembleConfig) -> Result<Vec<PointForecast>> {
    let future = ExogenousForecaster::new(Technique::NeuralAr, config)
        .forecast_all(&inputs.regressors, horizon)?;
    let model = NeuralAutoregression::new(config.neural);
    let diffs = fit_forecast(&model, &inputs.differences, &inputs.regressors, horizon, &future)?;
    Ok(recover_levels(inputs.anchor, &diffs))
}

fn run_trees(inputs: &WeeklyInputs, horizon: usize, config: &EnsembleConfig) -> Result<Vec<PointForecast>> {
    let future = ExogenousForecaster::new(Technique::RecursiveTree, config)
        .forecast_all(&inputs.regressors, horizon)?;
    let model = RecursiveTreeForecaster::new(config.trees);
    fit_forecast(&model, &inputs.levels, &inputs.regressors, horizon, &future)
}

fn run_monte_carlo(daily: &Split, config: &EnsembleConfig) -> Result<MonteCarloForecast> {
    MonteCarloEngine::new(config)?.run(&daily.train, &daily.test)
}

/// Daily and weekly train/test partitions of one symbol.
///
/// Days after `test_end` are discarded before aggregating to weeks. A week
/// that has days on both sides of the cutoff is tested, never trained on, so
/// no weekly training value carries information from after the cutoff.
pub fn split_frames(daily: &FeatureFrame, config: &EnsembleConfig) -> Result<(Split, Split)> {
    let window = &config.window;
    let required = config.columns.required();

    let daily = daily.between(None, window.test_end)?;
    let weekly_cutoff = complete_week_cutoff(daily.dates(), window.cutoff, window.week_start);
    let weekly = weekly_from_daily(&daily, window.week_start)?.drop_incomplete(&required)?;
    let daily = daily.drop_incomplete(&required)?;

    let daily_split = daily.split(window.train_start, window.cutoff, window.test_end)?;
    let weekly_split = weekly.split(window.train_start, weekly_cutoff, window.test_end)?;
    Ok((daily_split, weekly_split))
}

/// Forecast, combine and score one symbol from its daily feature frame
pub fn run_symbol(symbol: &str, daily: &FeatureFrame, config: &EnsembleConfig) -> Result<SymbolReport> {
    let window = &config.window;
    let (daily_split, weekly_split) = split_frames(daily, config)?;

    let weeks = weekly_split.test.dates().to_vec();
    let horizon = weeks.len();
    let actual = weekly_split.test.required_column(&config.columns.level)?;
    let inputs = WeeklyInputs::from_split(&weekly_split, config)?;
    info!(
        symbol,
        train_weeks = weekly_split.train.len(),
        test_weeks = horizon,
        test_days = daily_split.test.len(),
        "forecasting symbol"
    );

    let ((arimax, neural), (trees, monte_carlo)) = rayon::join(
        || {
            rayon::join(
                || run_arimax(&inputs, horizon, config),
                || run_neural(&inputs, horizon, config),
            )
        },
        || {
            rayon::join(
                || run_trees(&inputs, horizon, config),
                || run_monte_carlo(&daily_split, config),
            )
        },
    );

    let mut dropped_weeks = Vec::new();
    let mc_weekly = match &monte_carlo {
        Ok(mc) => {
            let (mc_weeks, mc_values) = mc.weekly(window.week_start);
            let points: Vec<PointForecast> = mc_values.into_iter().map(Ok).collect();
            let (aligned, dropped) = align_to_index(&mc_weeks, &points, &weeks)?;
            dropped_weeks = dropped;
            Ok(aligned.points().to_vec())
        }
        Err(e) => Err(ForecastError::ForecastingError(e.to_string())),
    };

    let mut forecasts = BTreeMap::new();
    forecasts.insert(Strategy::Arimax, settle(Strategy::Arimax, &weeks, arimax)?);
    forecasts.insert(Strategy::NeuralAr, settle(Strategy::NeuralAr, &weeks, neural)?);
    forecasts.insert(Strategy::RecursiveTree, settle(Strategy::RecursiveTree, &weeks, trees)?);
    forecasts.insert(
        Strategy::GarchMonteCarlo,
        settle(Strategy::GarchMonteCarlo, &weeks, mc_weekly)?,
    );

    let components: Vec<(Strategy, &ForecastResult)> = Strategy::COMPONENTS
        .iter()
        .filter_map(|s| forecasts.get(s).map(|f| (*s, f)))
        .collect();
    let ensemble = combine(&components)?;
    forecasts.insert(Strategy::Ensemble, ensemble);

    let records = forecasts
        .iter()
        .map(|(strategy, forecast)| evaluate(symbol, *strategy, forecast, &actual))
        .collect::<Result<Vec<_>>>()?;
    for record in &records {
        info!("{}", record);
    }

    Ok(SymbolReport {
        symbol: symbol.to_string(),
        weeks,
        actual,
        forecasts,
        monte_carlo: monte_carlo.ok(),
        dropped_weeks,
        records,
    })
}

/// Set aside symbols whose data could not be loaded or, with `features`
/// given, whose daily features could not be derived from raw bars
pub fn prepare_inputs(
    loaded: Vec<(String, Result<FeatureFrame>)>,
    features: Option<&FeatureSpec>,
) -> (Vec<(String, FeatureFrame)>, Vec<SkippedSymbol>) {
    let mut ready = Vec::with_capacity(loaded.len());
    let mut skipped = Vec::new();
    for (symbol, frame) in loaded {
        let frame = frame.and_then(|f| match features {
            Some(spec) => build_daily_features(&f, spec),
            None => Ok(f),
        });
        match frame {
            Ok(frame) => ready.push((symbol, frame)),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "symbol skipped before forecasting");
                skipped.push(SkippedSymbol {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }
    (ready, skipped)
}

/// Run every symbol independently; failing symbols are skipped and recorded
pub fn run_batch(inputs: &[(String, FeatureFrame)], config: &EnsembleConfig) -> BatchReport {
    let outcomes: Vec<(String, Result<SymbolReport>)> = inputs
        .par_iter()
        .map(|(symbol, frame)| (symbol.clone(), run_symbol(symbol, frame, config)))
        .collect();

    let mut batch = BatchReport::default();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(report) => batch.reports.push(report),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "symbol skipped");
                batch.skipped.push(SkippedSymbol {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }
    batch
}
