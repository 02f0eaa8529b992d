//! Forecasting models and the result types they share

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::{self, Debug};
use thiserror::Error;

pub mod arima;
pub mod garch;
pub mod neural;
pub mod trees;

/// The forecasting strategies that feed the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Strategy {
    /// Auto-selected ARIMA with external regressors on the differenced target
    Arimax,
    /// Feed-forward autoregressive network on the differenced target
    NeuralAr,
    /// Recursive gradient-boosted trees on the level target
    RecursiveTree,
    /// Rolling AR-GARCH Monte Carlo simulation, aggregated to weeks
    GarchMonteCarlo,
    /// Equal-weight mean of the four strategies above
    Ensemble,
}

impl Strategy {
    /// The four component strategies, in combination order
    pub const COMPONENTS: [Strategy; 4] = [
        Strategy::Arimax,
        Strategy::NeuralAr,
        Strategy::RecursiveTree,
        Strategy::GarchMonteCarlo,
    ];

    /// Short label used in reports and logs
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Arimax => "ARIMAX",
            Strategy::NeuralAr => "NNAR",
            Strategy::RecursiveTree => "Tree",
            Strategy::GarchMonteCarlo => "GARCH-MC",
            Strategy::Ensemble => "Ensemble",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a single forecast point has no value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum Unavailable {
    /// The model producing this point could not be fitted
    #[error("{model} fit failed: {reason}")]
    FitFailed { model: String, reason: String },
    /// A future regressor value needed at this step is unavailable
    #[error("regressor {name} unavailable at step {step}")]
    MissingRegressor { name: String, step: usize },
    /// An earlier step this point builds on is unavailable
    #[error("depends on unavailable step {step}")]
    PriorStep { step: usize },
    /// No daily forecast fell inside this week
    #[error("no daily forecast inside the week")]
    MissingWeek,
    /// One of the ensemble components is unavailable at this point
    #[error("{strategy} component unavailable")]
    MissingComponent { strategy: Strategy },
}

/// A point forecast, or the reason it could not be produced
pub type PointForecast = std::result::Result<f64, Unavailable>;

/// Forecast values aligned one-to-one with a window of timestamps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    dates: Vec<NaiveDate>,
    points: Vec<PointForecast>,
    intervals: Option<Vec<Option<(f64, f64)>>>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(dates: Vec<NaiveDate>, points: Vec<PointForecast>) -> Result<Self> {
        if dates.len() != points.len() {
            return Err(ForecastError::ForecastingError(format!(
                "Forecast has {} points for {} timestamps",
                points.len(),
                dates.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForecastError::DataError(
                "Forecast timestamps must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            dates,
            points,
            intervals: None,
        })
    }

    /// Create a new forecast result with an uncertainty band per point
    pub fn new_with_intervals(
        dates: Vec<NaiveDate>,
        points: Vec<PointForecast>,
        intervals: Vec<Option<(f64, f64)>>,
    ) -> Result<Self> {
        if intervals.len() != points.len() {
            return Err(ForecastError::ForecastingError(format!(
                "Forecast has {} points but {} intervals",
                points.len(),
                intervals.len()
            )));
        }
        let mut result = Self::new(dates, points)?;
        result.intervals = Some(intervals);
        Ok(result)
    }

    /// A result where every point is unavailable for the same reason
    pub fn unavailable(dates: Vec<NaiveDate>, reason: Unavailable) -> Result<Self> {
        let points = vec![Err(reason); dates.len()];
        Self::new(dates, points)
    }

    /// Get the forecast timestamps
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the point forecasts
    pub fn points(&self) -> &[PointForecast] {
        &self.points
    }

    /// Point values with unavailable points as `None`
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.as_ref().ok().copied()).collect()
    }

    /// Get the uncertainty band, if available
    pub fn intervals(&self) -> Option<&[Option<(f64, f64)>]> {
        self.intervals.as_deref()
    }

    /// Point forecast at `date`
    pub fn get(&self, date: NaiveDate) -> Option<&PointForecast> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| &self.points[idx])
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the forecast has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points carrying a value
    pub fn available_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_ok()).count()
    }
}

/// Training values of the external regressors, one column per regressor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regressors {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Regressors {
    /// Create a regressor matrix; every column must have the same length
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "{} regressor names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.len() != first.len()) {
                return Err(ForecastError::DataError(
                    "Regressor columns have different lengths".to_string(),
                ));
            }
        }
        Ok(Self { names, columns })
    }

    /// A model without external regressors
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of regressors
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of observations, `None` without regressors
    pub fn len(&self) -> Option<usize> {
        self.columns.first().map(Vec::len)
    }

    /// Whether there are no regressors
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Regressor names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Values of regressor `k`
    pub fn column(&self, k: usize) -> &[f64] {
        &self.columns[k]
    }

    /// All regressor values at observation `t`
    pub fn row(&self, t: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[t]).collect()
    }

    /// Check the regressors cover exactly `n` observations
    pub fn ensure_len(&self, n: usize) -> Result<()> {
        match self.len() {
            Some(len) if len != n => Err(ForecastError::DataError(format!(
                "Regressors cover {} observations but the series has {}",
                len, n
            ))),
            _ => Ok(()),
        }
    }
}

/// Forecasted regressor values over the horizon, possibly with gaps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FutureRegressors {
    names: Vec<String>,
    columns: Vec<Vec<PointForecast>>,
}

impl FutureRegressors {
    /// Create future regressors; every column must have the same length
    pub fn new(names: Vec<String>, columns: Vec<Vec<PointForecast>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "{} regressor names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.len() != first.len()) {
                return Err(ForecastError::DataError(
                    "Future regressor columns have different lengths".to_string(),
                ));
            }
        }
        Ok(Self { names, columns })
    }

    /// Future regressors known exactly
    pub fn from_values(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        let columns = columns
            .into_iter()
            .map(|c| c.into_iter().map(Ok).collect())
            .collect();
        Self::new(names, columns)
    }

    /// No future regressors
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of regressors
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Forecast horizon covered, `None` without regressors
    pub fn horizon(&self) -> Option<usize> {
        self.columns.first().map(Vec::len)
    }

    /// Regressor names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Forecasts of regressor `k`
    pub fn column(&self, k: usize) -> &[PointForecast] {
        &self.columns[k]
    }

    /// All regressor values at horizon step `step` (0-based)
    pub fn row(&self, step: usize) -> std::result::Result<Vec<f64>, Unavailable> {
        self.columns
            .iter()
            .zip(&self.names)
            .map(|(column, name)| match column.get(step) {
                Some(Ok(v)) => Ok(*v),
                _ => Err(Unavailable::MissingRegressor {
                    name: name.clone(),
                    step,
                }),
            })
            .collect()
    }

    /// Check the regressors match the training width and cover `horizon` steps
    pub fn ensure_covers(&self, width: usize, horizon: usize) -> Result<()> {
        if self.width() != width {
            return Err(ForecastError::DataError(format!(
                "Model was trained with {} regressors but {} future regressors were given",
                width,
                self.width()
            )));
        }
        match self.horizon() {
            Some(h) if h < horizon => Err(ForecastError::DataError(format!(
                "Future regressors cover {} steps, horizon is {}",
                h, horizon
            ))),
            _ => Ok(()),
        }
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send + Sync {
    /// Forecast `horizon` steps past the end of the training series
    fn forecast(&self, horizon: usize, future: &FutureRegressors) -> Result<Vec<PointForecast>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a series and its regressors
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a series with aligned regressors
    fn train(&self, series: &[f64], regressors: &Regressors) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Train `model` and forecast `horizon` steps in one go.
///
/// A non-finite point is reported as a failed fit, and every point after the
/// first unavailable one as depending on it.
pub fn fit_forecast<M: ForecastModel>(
    model: &M,
    series: &[f64],
    regressors: &Regressors,
    horizon: usize,
    future: &FutureRegressors,
) -> Result<Vec<PointForecast>> {
    let trained = model.train(series, regressors)?;
    let points = trained.forecast(horizon, future)?;
    if points.len() != horizon {
        return Err(ForecastError::ForecastingError(format!(
            "{} produced {} points for horizon {}",
            trained.name(),
            points.len(),
            horizon
        )));
    }
    let name = trained.name().to_string();
    Ok(propagate_gaps(
        points
            .into_iter()
            .map(|p| match p {
                Ok(v) if !v.is_finite() => Err(Unavailable::FitFailed {
                    model: name.clone(),
                    reason: "non-finite forecast".to_string(),
                }),
                other => other,
            })
            .collect(),
    ))
}

/// Mark every point after the first unavailable one as depending on it.
///
/// Recursive forecasters feed each prediction into the next step, so a gap
/// can never be followed by a value.
pub(crate) fn propagate_gaps(points: Vec<PointForecast>) -> Vec<PointForecast> {
    let mut first_gap: Option<usize> = None;
    points
        .into_iter()
        .enumerate()
        .map(|(step, point)| match (first_gap, point) {
            (Some(gap), Ok(_)) => Err(Unavailable::PriorStep { step: gap }),
            (None, Err(reason)) => {
                first_gap = Some(step);
                Err(reason)
            }
            (_, point) => point,
        })
        .collect()
}

/// Fold a one-step forecaster over the horizon.
///
/// `step` maps `(state, regressor row)` to `(next state, value)`. A missing
/// regressor row stops the recursion; later steps depend on it.
pub(crate) fn forecast_recursively<S, F>(
    horizon: usize,
    future: &FutureRegressors,
    initial: S,
    step: F,
) -> Result<Vec<PointForecast>>
where
    F: Fn(&S, &[f64]) -> Result<(S, f64)>,
{
    let mut state = initial;
    let mut points: Vec<PointForecast> = Vec::with_capacity(horizon);
    let mut gap: Option<usize> = None;
    for idx in 0..horizon {
        if let Some(first) = gap {
            points.push(Err(Unavailable::PriorStep { step: first }));
            continue;
        }
        match future.row(idx) {
            Ok(row) => {
                let (next, value) = step(&state, &row)?;
                state = next;
                points.push(Ok(value));
            }
            Err(reason) => {
                gap = Some(idx);
                points.push(Err(reason));
            }
        }
    }
    Ok(points)
}
