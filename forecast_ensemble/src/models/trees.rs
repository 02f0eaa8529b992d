//! Gradient-boosted regression trees with recursive multi-step forecasting
//!
//! Two forecasters share the boosting core:
//! - [`LagTreeForecaster`] predicts a series from its own last `k` values.
//! - [`RecursiveTreeForecaster`] predicts a level series from its last two
//!   levels and the current regressor values.
//!
//! Both forecast recursively: every prediction becomes an input of the next
//! step, so errors compound along the horizon.

use crate::config::TreeConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    forecast_recursively, ForecastModel, FutureRegressors, PointForecast, Regressors,
    TrainedForecastModel,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| ForecastError::ForecastingError(format!("Matrix error: {}", e)))
}

/// Squared-loss gradient boosting over smartcore regression trees
#[derive(Debug)]
pub struct BoostedTrees {
    base: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl BoostedTrees {
    /// Fit `n_estimators` trees, each to the residuals of the ensemble so far
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &TreeConfig) -> Result<Self> {
        let min_rows = 2 * config.min_samples_leaf.max(1);
        if rows.len() < min_rows {
            return Err(ForecastError::InsufficientData(format!(
                "Boosting needs at least {} rows, have {}",
                min_rows,
                rows.len()
            )));
        }
        let x = matrix(rows)?;
        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut fitted = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            let params = DecisionTreeRegressorParameters::default()
                .with_max_depth(config.max_depth)
                .with_min_samples_leaf(config.min_samples_leaf);
            let tree = Tree::fit(&x, &residuals, params)?;
            let update = tree.predict(&x)?;
            for (f, u) in fitted.iter_mut().zip(&update) {
                *f += config.learning_rate * u;
            }
            trees.push(tree);
        }

        Ok(Self {
            base,
            learning_rate: config.learning_rate,
            trees,
        })
    }

    /// Predict a single feature row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let x = matrix(&[row.to_vec()])?;
        let mut prediction = self.base;
        for tree in &self.trees {
            let update = tree.predict(&x)?;
            prediction += self.learning_rate * update.first().copied().unwrap_or(0.0);
        }
        Ok(prediction)
    }

    /// Number of fitted trees
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether no trees were fitted
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Embedding rows `[v_{t-1}, ..., v_{t-k}]` with targets `v_t`
pub fn embed(series: &[f64], lags: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    (lags..series.len())
        .map(|t| ((1..=lags).map(|i| series[t - i]).collect(), series[t]))
        .unzip()
}

/// One recursive step: predict from the buffer, then shift the prediction in.
///
/// `buffer` holds the most recent values, oldest first.
pub fn recursive_step(model: &BoostedTrees, buffer: &[f64]) -> Result<(Vec<f64>, f64)> {
    let row: Vec<f64> = buffer.iter().rev().copied().collect();
    let prediction = model.predict_row(&row)?;
    let mut next: Vec<f64> = buffer.iter().skip(1).copied().collect();
    next.push(prediction);
    Ok((next, prediction))
}

/// Boosted trees forecasting a series from its own lags
#[derive(Debug, Clone)]
pub struct LagTreeForecaster {
    config: TreeConfig,
}

/// Trained lag forecaster with its initial history buffer
#[derive(Debug)]
pub struct TrainedLagTrees {
    model: BoostedTrees,
    buffer: Vec<f64>,
}

impl LagTreeForecaster {
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }
}

impl ForecastModel for LagTreeForecaster {
    type Trained = TrainedLagTrees;

    fn train(&self, series: &[f64], regressors: &Regressors) -> Result<TrainedLagTrees> {
        if !regressors.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "lag tree forecaster takes no external regressors".to_string(),
            ));
        }
        let lags = self.config.lags;
        if series.len() <= lags {
            return Err(ForecastError::InsufficientData(format!(
                "{} observations cannot be embedded with {} lags",
                series.len(),
                lags
            )));
        }
        let (rows, targets) = embed(series, lags);
        let model = BoostedTrees::fit(&rows, &targets, &self.config)?;
        debug!(lags, rows = rows.len(), "lag trees trained");

        Ok(TrainedLagTrees {
            model,
            buffer: series[series.len() - lags..].to_vec(),
        })
    }

    fn name(&self) -> &str {
        "LagTrees"
    }
}

impl TrainedLagTrees {
    /// Forecast by folding [`recursive_step`] over the horizon
    pub fn forecast_values(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut buffer = self.buffer.clone();
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let (next, prediction) = recursive_step(&self.model, &buffer)?;
            buffer = next;
            out.push(prediction);
        }
        Ok(out)
    }
}

impl TrainedForecastModel for TrainedLagTrees {
    fn forecast(&self, horizon: usize, _future: &FutureRegressors) -> Result<Vec<PointForecast>> {
        Ok(self.forecast_values(horizon)?.into_iter().map(Ok).collect())
    }

    fn name(&self) -> &str {
        "LagTrees"
    }
}

/// Boosted trees forecasting a level from two lagged levels and regressors.
///
/// The trees learn the change `level_t - level_{t-1}`; predictions are
/// re-anchored on the previous level so the output is a level.
#[derive(Debug, Clone)]
pub struct RecursiveTreeForecaster {
    config: TreeConfig,
}

/// Trained level forecaster
#[derive(Debug)]
pub struct TrainedRecursiveTrees {
    model: BoostedTrees,
    width: usize,
    /// `[level_{n-2}, level_{n-1}]`
    buffer: [f64; 2],
}

impl RecursiveTreeForecaster {
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }
}

impl ForecastModel for RecursiveTreeForecaster {
    type Trained = TrainedRecursiveTrees;

    fn train(&self, series: &[f64], regressors: &Regressors) -> Result<TrainedRecursiveTrees> {
        regressors.ensure_len(series.len())?;
        let n = series.len();
        if n < 3 {
            return Err(ForecastError::InsufficientData(format!(
                "recursive trees need at least 3 levels, have {}",
                n
            )));
        }

        let rows: Vec<Vec<f64>> = (2..n)
            .map(|t| {
                let mut row = vec![series[t - 1], series[t - 2]];
                row.extend(regressors.row(t));
                row
            })
            .collect();
        let targets: Vec<f64> = (2..n).map(|t| series[t] - series[t - 1]).collect();
        let model = BoostedTrees::fit(&rows, &targets, &self.config)?;
        debug!(rows = rows.len(), regressors = regressors.width(), "level trees trained");

        Ok(TrainedRecursiveTrees {
            model,
            width: regressors.width(),
            buffer: [series[n - 2], series[n - 1]],
        })
    }

    fn name(&self) -> &str {
        "RecursiveTrees"
    }
}

impl TrainedRecursiveTrees {
    /// One step of the level recursion
    pub fn step(&self, buffer: [f64; 2], regressors: &[f64]) -> Result<([f64; 2], f64)> {
        let [older, last] = buffer;
        let mut row = vec![last, older];
        row.extend_from_slice(regressors);
        let level = last + self.model.predict_row(&row)?;
        Ok(([last, level], level))
    }
}

impl TrainedForecastModel for TrainedRecursiveTrees {
    fn forecast(&self, horizon: usize, future: &FutureRegressors) -> Result<Vec<PointForecast>> {
        future.ensure_covers(self.width, horizon)?;
        forecast_recursively(horizon, future, self.buffer, |buffer, row| {
            self.step(*buffer, row)
        })
    }

    fn name(&self) -> &str {
        "RecursiveTrees"
    }
}
