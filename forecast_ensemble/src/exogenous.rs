//! Forecasts of the external regressors over the test horizon
//!
//! Each regressor is forecast from its own history alone, independently of
//! the others. A regressor whose model cannot be fitted yields an all
//! unavailable column instead of an error, so downstream models see the gap
//! at every step that needs it.

use crate::config::EnsembleConfig;
use crate::error::Result;
use crate::models::arima::AutoArima;
use crate::models::neural::NeuralAutoregression;
use crate::models::trees::LagTreeForecaster;
use crate::models::{fit_forecast, FutureRegressors, PointForecast, Regressors, Unavailable};
use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

/// Technique used to forecast a regressor, matched to the consuming model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Technique {
    /// Automatic ARIMA on the regressor's own history
    AutoArima,
    /// Neural autoregression on the regressor's own history
    NeuralAr,
    /// Boosted trees on lagged values of the regressor
    RecursiveTree,
}

impl Technique {
    pub fn label(&self) -> &'static str {
        match self {
            Technique::AutoArima => "auto-ARIMA",
            Technique::NeuralAr => "NNAR",
            Technique::RecursiveTree => "lag trees",
        }
    }
}

/// Forecasts every regressor with one technique
#[derive(Debug, Clone)]
pub struct ExogenousForecaster<'a> {
    technique: Technique,
    config: &'a EnsembleConfig,
}

impl<'a> ExogenousForecaster<'a> {
    pub fn new(technique: Technique, config: &'a EnsembleConfig) -> Self {
        Self { technique, config }
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    /// Forecast one regressor `horizon` steps ahead
    pub fn forecast_column(&self, name: &str, history: &[f64], horizon: usize) -> Vec<PointForecast> {
        match self.try_forecast(history, horizon) {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    regressor = name,
                    technique = self.technique.label(),
                    error = %e,
                    "regressor forecast failed"
                );
                vec![
                    Err(Unavailable::FitFailed {
                        model: format!("{} for {}", self.technique.label(), name),
                        reason: e.to_string(),
                    });
                    horizon
                ]
            }
        }
    }

    /// Forecast every regressor column
    pub fn forecast_all(&self, regressors: &Regressors, horizon: usize) -> Result<FutureRegressors> {
        let columns: Vec<Vec<PointForecast>> = (0..regressors.width())
            .into_par_iter()
            .map(|k| self.forecast_column(&regressors.names()[k], regressors.column(k), horizon))
            .collect();
        FutureRegressors::new(regressors.names().to_vec(), columns)
    }

    fn try_forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<PointForecast>> {
        let none = Regressors::empty();
        let future = FutureRegressors::empty();
        match self.technique {
            Technique::AutoArima => {
                let model = AutoArima::new(self.config.arima, self.config.minimizer()?);
                fit_forecast(&model, history, &none, horizon, &future)
            }
            Technique::NeuralAr => {
                let model = NeuralAutoregression::new(self.config.neural);
                fit_forecast(&model, history, &none, horizon, &future)
            }
            Technique::RecursiveTree => {
                let model = LagTreeForecaster::new(self.config.trees);
                fit_forecast(&model, history, &none, horizon, &future)
            }
        }
    }
}
