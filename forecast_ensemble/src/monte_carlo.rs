//! Rolling volatility-conditional Monte Carlo engine
//!
//! Three stages, all at daily frequency on first-differenced returns:
//!
//! 1. An expanding-window refit loop produces a one-step conditional
//!    volatility for every test day, and a one-step conditional mean for every
//!    regressor. The loop is a fold over [`RollingState`]; step `i` sees the
//!    training data plus the first `i - 1` realised test observations.
//! 2. A structural AR(1)-GARCH(1,1) fit with the regressors in the mean
//!    equation, on the full training window only.
//! 3. Seeded simulation of independent return paths, cumulated onto the last
//!    training level and reduced to a mean and percentile band per day.

use crate::calendar::last_by_week;
use crate::config::EnsembleConfig;
use crate::data::FeatureFrame;
use crate::error::{ForecastError, Result};
use crate::models::garch::{ArGarchFit, GarchParams};
use crate::models::{ForecastResult, Regressors, Unavailable};
use chrono::{NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use trade_math::optimize::NelderMead;
use trade_math::statistics::{clip_to_quantiles, mean, quantile};

/// One-step-ahead conditional moments from a single refit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OneStep {
    pub mean: f64,
    pub volatility: f64,
}

/// Outcome of one rolling refit
pub type RollingOutput = std::result::Result<OneStep, Unavailable>;

/// State carried between rolling refits: the expanding window and the last
/// converged variance parameters
#[derive(Debug, Clone)]
pub struct RollingState {
    window: Vec<f64>,
    warm_start: Option<GarchParams>,
}

impl RollingState {
    pub fn new(train: &[f64]) -> Self {
        Self {
            window: train.to_vec(),
            warm_start: None,
        }
    }

    /// Observations in the current window
    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Refit on the current window, forecast one step, then admit `realized`
    pub fn advance<F>(self, realized: f64, fit: &F) -> (Self, RollingOutput)
    where
        F: Fn(&[f64], Option<GarchParams>) -> Result<ArGarchFit>,
    {
        let Self {
            mut window,
            warm_start,
        } = self;

        let (output, warm_start) = match fit(&window, warm_start) {
            Ok(model) => (
                Ok(OneStep {
                    mean: model.next_mean(),
                    volatility: model.next_volatility(),
                }),
                Some(model.params()),
            ),
            Err(e) => {
                debug!(window = window.len(), error = %e, "rolling refit failed");
                (
                    Err(Unavailable::FitFailed {
                        model: "AR(1)-GARCH(1,1)".to_string(),
                        reason: e.to_string(),
                    }),
                    warm_start,
                )
            }
        };

        window.push(realized);
        (
            Self {
                window,
                warm_start,
            },
            output,
        )
    }
}

/// Run the expanding-window loop: one refit per test observation
pub fn rolling_forecasts<F>(train: &[f64], test: &[f64], fit: F) -> Vec<RollingOutput>
where
    F: Fn(&[f64], Option<GarchParams>) -> Result<ArGarchFit>,
{
    test.iter()
        .scan(Some(RollingState::new(train)), |state, realized| {
            let (next, output) = state.take()?.advance(*realized, &fit);
            *state = Some(next);
            Some(output)
        })
        .collect()
}

/// Replace unavailable values with the last available one, or `fallback`
/// before any value is available. Returns the values and the filled count.
pub fn fill_forward(values: &[std::result::Result<f64, Unavailable>], fallback: f64) -> (Vec<f64>, usize) {
    let mut last = fallback;
    let mut filled = 0;
    let out = values
        .iter()
        .map(|v| match v {
            Ok(x) => {
                last = *x;
                *x
            }
            Err(_) => {
                filled += 1;
                last
            }
        })
        .collect();
    (out, filled)
}

/// Everything a path simulation needs, fixed before the first path starts
#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub intercept: f64,
    pub ar: f64,
    pub coefficients: Vec<f64>,
    pub last_return: f64,
    pub last_level: f64,
    /// Conditional volatility per step
    pub volatility: Vec<f64>,
    /// Regressor values per step, one row per step
    pub regressors: Vec<Vec<f64>>,
}

impl SimulationInput {
    pub fn horizon(&self) -> usize {
        self.volatility.len()
    }

    /// Level path driven by `shocks`, one shock per step
    pub fn path(&self, shocks: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut previous = self.last_return;
        let mut level = self.last_level;
        shocks
            .zip(&self.volatility)
            .zip(&self.regressors)
            .map(|((shock, sigma), row)| {
                let drift: f64 = self.coefficients.iter().zip(row).map(|(c, x)| c * x).sum();
                let r = self.intercept + self.ar * previous + drift + sigma * shock;
                previous = r;
                level += r;
                level
            })
            .collect()
    }
}

/// Simulate `paths` level paths; path `j` draws from a generator seeded with `seed + j`
pub fn simulate_paths(input: &SimulationInput, paths: usize, seed: u64) -> Vec<Vec<f64>> {
    (0..paths)
        .into_par_iter()
        .map(|j| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(j as u64));
            let shocks: Vec<f64> = (0..input.horizon())
                .map(|_| StandardNormal.sample(&mut rng))
                .collect();
            input.path(shocks.into_iter())
        })
        .collect()
}

/// Cross-path mean and percentile band per step
pub fn reduce_paths(paths: &[Vec<f64>], lower: f64, upper: f64) -> Result<Vec<(f64, f64, f64)>> {
    let horizon = paths.first().map_or(0, Vec::len);
    (0..horizon)
        .map(|step| {
            let column: Vec<f64> = paths.iter().map(|p| p[step]).collect();
            let avg = mean(&column).unwrap_or(f64::NAN);
            Ok((avg, quantile(&column, lower)?, quantile(&column, upper)?))
        })
        .collect()
}

/// Daily output of the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloForecast {
    pub dates: Vec<NaiveDate>,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Volatility used per step after filling
    pub volatility: Vec<f64>,
    /// Rolling refits that failed, over the target and all regressors
    pub failed_refits: usize,
    /// Steps whose volatility or regressor mean was carried forward
    pub filled_steps: usize,
}

impl MonteCarloForecast {
    /// Daily mean forecast with its percentile band
    pub fn daily(&self) -> Result<ForecastResult> {
        ForecastResult::new_with_intervals(
            self.dates.clone(),
            self.mean.iter().copied().map(Ok).collect(),
            self.lower
                .iter()
                .zip(&self.upper)
                .map(|(lo, hi)| Some((*lo, *hi)))
                .collect(),
        )
    }

    /// Last daily mean of every week, keyed by week start
    pub fn weekly(&self, week_start: Weekday) -> (Vec<NaiveDate>, Vec<f64>) {
        last_by_week(&self.dates, &self.mean, week_start)
    }
}

/// Rolling refit and simulation over one symbol's daily split
#[derive(Debug, Clone)]
pub struct MonteCarloEngine<'a> {
    config: &'a EnsembleConfig,
    minimizer: NelderMead,
}

impl<'a> MonteCarloEngine<'a> {
    pub fn new(config: &'a EnsembleConfig) -> Result<Self> {
        Ok(Self {
            config,
            minimizer: config.minimizer()?,
        })
    }

    /// Fit on the training rows and simulate the test rows.
    ///
    /// Both frames must have the level, return and regressor columns defined.
    pub fn run(&self, train: &FeatureFrame, test: &FeatureFrame) -> Result<MonteCarloForecast> {
        let columns = &self.config.columns;
        let garch = &self.config.garch;
        let horizon = test.len();
        if horizon == 0 {
            return Err(ForecastError::InsufficientData(
                "daily test window is empty".to_string(),
            ));
        }

        let train_returns = train.required_column(&columns.returns)?;
        let test_returns = test.required_column(&columns.returns)?;
        let train_levels = train.required_column(&columns.level)?;
        let last_level = *train_levels.last().ok_or_else(|| {
            ForecastError::InsufficientData("daily training window is empty".to_string())
        })?;

        let train_regressors = columns
            .regressors
            .iter()
            .map(|name| train.required_column(name))
            .collect::<Result<Vec<_>>>()?;
        let test_regressors = columns
            .regressors
            .iter()
            .map(|name| test.required_column(name))
            .collect::<Result<Vec<_>>>()?;

        let structural = ArGarchFit::fit(
            &train_returns,
            &Regressors::new(columns.regressors.clone(), train_regressors.clone())?,
            None,
            &self.minimizer,
        )?;
        debug!(
            intercept = structural.intercept(),
            ar = structural.ar_coefficient(),
            "structural GARCH fit"
        );

        let plain = |window: &[f64], warm: Option<GarchParams>| {
            ArGarchFit::fit(window, &Regressors::empty(), warm, &self.minimizer)
        };
        let clipped = |window: &[f64], warm: Option<GarchParams>| {
            let bounded = clip_to_quantiles(window, garch.clip_lower, garch.clip_upper)?;
            ArGarchFit::fit(&bounded, &Regressors::empty(), warm, &self.minimizer)
        };

        // The target loop and each regressor loop are independent folds.
        let (target_rolling, regressor_rolling) = rayon::join(
            || rolling_forecasts(&train_returns, &test_returns, plain),
            || {
                train_regressors
                    .par_iter()
                    .zip(test_regressors.par_iter())
                    .map(|(train_k, test_k)| rolling_forecasts(train_k, test_k, clipped))
                    .collect::<Vec<_>>()
            },
        );

        let mut failed_refits = target_rolling.iter().filter(|o| o.is_err()).count();
        let volatility_steps: Vec<_> = target_rolling
            .iter()
            .map(|o| o.as_ref().map(|s| s.volatility).map_err(Clone::clone))
            .collect();
        let (volatility, mut filled_steps) =
            fill_forward(&volatility_steps, structural.next_volatility());

        let mut regressor_paths = Vec::with_capacity(regressor_rolling.len());
        for (outputs, history) in regressor_rolling.iter().zip(&train_regressors) {
            failed_refits += outputs.iter().filter(|o| o.is_err()).count();
            let means: Vec<_> = outputs
                .iter()
                .map(|o| o.as_ref().map(|s| s.mean).map_err(Clone::clone))
                .collect();
            let (values, filled) = fill_forward(&means, mean(history).unwrap_or(0.0));
            filled_steps += filled;
            regressor_paths.push(values);
        }
        if failed_refits > 0 {
            warn!(failed_refits, filled_steps, "rolling refits failed, values carried forward");
        }

        let input = SimulationInput {
            intercept: structural.intercept(),
            ar: structural.ar_coefficient(),
            coefficients: structural.regressor_coefficients().to_vec(),
            last_return: structural.last_return(),
            last_level,
            regressors: (0..horizon)
                .map(|t| regressor_paths.iter().map(|c| c[t]).collect())
                .collect(),
            volatility: volatility.clone(),
        };
        let paths = simulate_paths(&input, garch.paths, garch.seed);
        let summary = reduce_paths(&paths, garch.lower_band, garch.upper_band)?;
        info!(paths = garch.paths, horizon, "Monte Carlo simulation finished");

        let (mean_path, (lower, upper)): (Vec<f64>, (Vec<f64>, Vec<f64>)) =
            summary.into_iter().map(|(m, lo, hi)| (m, (lo, hi))).unzip();

        Ok(MonteCarloForecast {
            dates: test.dates().to_vec(),
            mean: mean_path,
            lower,
            upper,
            volatility,
            failed_refits,
            filled_steps,
        })
    }
}
