//! Run configuration loaded from TOML
//!
//! Every section has defaults, so a file only needs the `[window]` dates:
//!
//! ```toml
//! [window]
//! train_start = "2022-01-03"
//! cutoff = "2022-12-16"
//!
//! [garch]
//! paths = 5000
//! ```

use crate::error::{ForecastError, Result};
use crate::features::{FeatureSpec, DEFAULT_REGRESSORS};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable configuration snapshot shared by every symbol in a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub window: WindowConfig,
    pub columns: ColumnConfig,
    pub features: FeatureSpec,
    pub arima: ArimaConfig,
    pub neural: NeuralConfig,
    pub trees: TreeConfig,
    pub garch: GarchConfig,
    pub fitting: FittingConfig,
}

/// Train/test window and weekly bucketing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub train_start: NaiveDate,
    pub cutoff: NaiveDate,
    /// Last test date; the end of the data when absent
    pub test_end: Option<NaiveDate>,
    pub week_start: Weekday,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            train_start: NaiveDate::MIN,
            cutoff: NaiveDate::MIN,
            test_end: None,
            week_start: Weekday::Mon,
        }
    }
}

/// Names of the feature columns the strategies read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Level of the forecast target
    pub level: String,
    /// First difference of the target level
    pub difference: String,
    /// Daily return series driving the volatility model
    pub returns: String,
    pub regressors: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            level: "close".to_string(),
            difference: "close_diff".to_string(),
            returns: "close_diff".to_string(),
            regressors: DEFAULT_REGRESSORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ColumnConfig {
    /// Every column a fitting row must have defined
    pub fn required(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        let all = [&self.level, &self.difference, &self.returns]
            .into_iter()
            .chain(self.regressors.iter());
        for name in all {
            if !columns.contains(&name.as_str()) {
                columns.push(name.as_str());
            }
        }
        columns
    }
}

/// Order search bounds for ARIMA models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaConfig {
    pub max_p: usize,
    pub max_q: usize,
    pub max_d: usize,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 3,
            max_q: 2,
            max_d: 1,
        }
    }
}

/// Neural autoregression settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralConfig {
    pub max_lags: usize,
    /// Networks averaged per forecast
    pub repeats: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub seed: u64,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            max_lags: 4,
            repeats: 20,
            epochs: 400,
            learning_rate: 0.01,
            weight_decay: 1e-4,
            seed: 42,
        }
    }
}

/// Gradient-boosted tree settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Lagged values per row when a regressor forecasts itself
    pub lags: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            lags: 3,
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 2,
        }
    }
}

/// Rolling volatility and Monte Carlo settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarchConfig {
    pub paths: usize,
    pub seed: u64,
    /// Quantile clip points applied to regressors before each refit
    pub clip_lower: f64,
    pub clip_upper: f64,
    /// Percentiles of the simulated band, in [0, 1]
    pub lower_band: f64,
    pub upper_band: f64,
}

impl Default for GarchConfig {
    fn default() -> Self {
        Self {
            paths: 5_000,
            seed: 2024,
            clip_lower: 0.01,
            clip_upper: 0.99,
            lower_band: 0.025,
            upper_band: 0.975,
        }
    }
}

/// Bounds applied to every iterative fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-8,
        }
    }
}

impl EnsembleConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ForecastError::ConfigError(msg));

        if self.window.train_start > self.window.cutoff {
            return invalid(format!(
                "train_start {} is after cutoff {}",
                self.window.train_start, self.window.cutoff
            ));
        }
        if let Some(end) = self.window.test_end {
            if end <= self.window.cutoff {
                return invalid(format!(
                    "test_end {} must be after cutoff {}",
                    end, self.window.cutoff
                ));
            }
        }
        if self.columns.regressors.is_empty() {
            return invalid("at least one regressor column is required".to_string());
        }
        if self.neural.max_lags == 0 || self.neural.repeats == 0 || self.neural.epochs == 0 {
            return invalid("neural max_lags, repeats and epochs must be positive".to_string());
        }
        if self.neural.learning_rate <= 0.0 {
            return invalid("neural learning_rate must be positive".to_string());
        }
        if self.trees.lags == 0 || self.trees.n_estimators == 0 || self.trees.max_depth == 0 {
            return invalid("tree lags, n_estimators and max_depth must be positive".to_string());
        }
        if !(self.trees.learning_rate > 0.0 && self.trees.learning_rate <= 1.0) {
            return invalid(format!(
                "tree learning_rate must be in (0, 1], got {}",
                self.trees.learning_rate
            ));
        }
        if self.garch.paths == 0 {
            return invalid("garch paths must be positive".to_string());
        }
        let g = &self.garch;
        if !(0.0 <= g.clip_lower && g.clip_lower < g.clip_upper && g.clip_upper <= 1.0) {
            return invalid(format!(
                "clip quantiles must satisfy 0 <= lower < upper <= 1, got {} and {}",
                g.clip_lower, g.clip_upper
            ));
        }
        if !(0.0 <= g.lower_band && g.lower_band < g.upper_band && g.upper_band <= 1.0) {
            return invalid(format!(
                "band percentiles must satisfy 0 <= lower < upper <= 1, got {} and {}",
                g.lower_band, g.upper_band
            ));
        }
        if self.fitting.max_iterations == 0 || self.fitting.tolerance <= 0.0 {
            return invalid("fitting max_iterations and tolerance must be positive".to_string());
        }
        Ok(())
    }

    /// Minimiser configured with the fitting bounds
    pub fn minimizer(&self) -> Result<trade_math::optimize::NelderMead> {
        Ok(trade_math::optimize::NelderMead::new(
            self.fitting.max_iterations,
            self.fitting.tolerance,
        )?)
    }
}
