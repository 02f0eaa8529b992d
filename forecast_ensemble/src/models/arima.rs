//! ARIMA with external regressors and automatic order selection
//!
//! The model is a regression with ARMA errors on the `d`-times differenced
//! series:
//!
//! ```text
//! y'_t = c + b . x'_t + n_t,    n_t = sum phi_i n_{t-i} + e_t + sum theta_j e_{t-j}
//! ```
//!
//! `d` is picked with a KPSS level-stationarity test, `(p, q)` by the smallest
//! AICc over the configured grid. The regression part is fitted by least
//! squares and the ARMA part by conditional sum of squares.

use crate::config::ArimaConfig;
use crate::error::{ForecastError, Result};
use crate::level::recover_levels;
use crate::models::{
    ForecastModel, FutureRegressors, PointForecast, Regressors, TrainedForecastModel, Unavailable,
};
use tracing::debug;
use trade_math::differencing::{difference, difference_aligned, difference_n};
use trade_math::optimize::NelderMead;
use trade_math::regression::least_squares;
use trade_math::statistics::kpss_level_statistic;

/// 5% critical value of the KPSS level-stationarity statistic
const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Orders of an ARIMA model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// Automatically order-selected ARIMA(X) model
#[derive(Debug, Clone)]
pub struct AutoArima {
    /// Search bounds
    bounds: ArimaConfig,
    /// Minimiser for the ARMA coefficients
    minimizer: NelderMead,
}

/// Trained ARIMA(X) model
#[derive(Debug, Clone)]
pub struct TrainedArima {
    name: String,
    order: ArimaOrder,
    intercept: f64,
    beta: Vec<f64>,
    phi: Vec<f64>,
    theta: Vec<f64>,
    /// Last value of the series at each differencing level `0..d`
    anchors: Vec<f64>,
    /// Last `d` raw values of each regressor
    regressor_tails: Vec<Vec<f64>>,
    /// Last `p` regression errors
    error_tail: Vec<f64>,
    /// Last `q` innovations
    innovation_tail: Vec<f64>,
    sigma2: f64,
    aicc: f64,
}

/// One fitted candidate of the order search
struct Candidate {
    p: usize,
    q: usize,
    phi: Vec<f64>,
    theta: Vec<f64>,
    css: f64,
    aicc: f64,
}

impl AutoArima {
    /// Create a model searching orders up to the given bounds
    pub fn new(bounds: ArimaConfig, minimizer: NelderMead) -> Self {
        Self { bounds, minimizer }
    }

    /// Pick the differencing order by repeated KPSS tests
    pub fn select_d(&self, series: &[f64]) -> usize {
        let mut current = series.to_vec();
        for d in 0..self.bounds.max_d {
            match kpss_level_statistic(&current) {
                Ok(stat) if stat < KPSS_CRITICAL_5PCT => return d,
                Ok(stat) => debug!(d, stat, "KPSS rejects level stationarity"),
                Err(_) => return d,
            }
            current = difference(&current);
        }
        self.bounds.max_d
    }

    fn fit_candidate(&self, errors: &[f64], p: usize, q: usize, k: usize) -> Result<Candidate> {
        let start = self.bounds.max_p;
        let n_eff = errors.len().saturating_sub(start);
        let npar = p + q + k + 2;
        if n_eff <= npar + 1 {
            return Err(ForecastError::InsufficientData(format!(
                "ARMA({},{}) needs more than {} usable observations, have {}",
                p,
                q,
                npar + 1,
                n_eff
            )));
        }

        let (phi, theta, css) = if p + q == 0 {
            (Vec::new(), Vec::new(), conditional_sse(errors, &[], &[], start))
        } else {
            let init = hannan_rissanen(errors, p, q);
            let objective = |params: &[f64]| {
                let (phi, theta) = params.split_at(p);
                if !admissible(phi) || !admissible(theta) {
                    return f64::INFINITY;
                }
                conditional_sse(errors, phi, theta, start)
            };
            let min = self
                .minimizer
                .minimize(objective, &init)
                .map_err(|e| ForecastError::non_convergence(format!("ARMA({},{})", p, q), e))?;
            let (phi, theta) = min.point.split_at(p);
            (phi.to_vec(), theta.to_vec(), min.value)
        };

        let sigma2 = (css / n_eff as f64).max(f64::MIN_POSITIVE);
        let n = n_eff as f64;
        let m = npar as f64;
        let aicc = n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0)
            + 2.0 * m
            + 2.0 * m * (m + 1.0) / (n - m - 1.0);

        Ok(Candidate {
            p,
            q,
            phi,
            theta,
            css,
            aicc,
        })
    }
}

impl ForecastModel for AutoArima {
    type Trained = TrainedArima;

    fn train(&self, series: &[f64], regressors: &Regressors) -> Result<TrainedArima> {
        regressors.ensure_len(series.len())?;
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "ARIMA training series contains non-finite values".to_string(),
            ));
        }

        let d = self.select_d(series);
        let y = difference_n(series, d)?;
        let columns = (0..regressors.width())
            .map(|k| difference_n(regressors.column(k), d))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let rows: Vec<Vec<f64>> = (0..y.len())
            .map(|t| std::iter::once(1.0).chain(columns.iter().map(|c| c[t])).collect())
            .collect();
        let regression = least_squares(&rows, &y)?;
        let errors = regression.residuals().to_vec();
        let k = regressors.width();

        let mut best: Option<Candidate> = None;
        for p in 0..=self.bounds.max_p {
            for q in 0..=self.bounds.max_q {
                match self.fit_candidate(&errors, p, q, k) {
                    Ok(candidate) => {
                        debug!(p, d, q, aicc = candidate.aicc, css = candidate.css, "ARIMA candidate");
                        if best.as_ref().map_or(true, |b| candidate.aicc < b.aicc) {
                            best = Some(candidate);
                        }
                    }
                    Err(e) => debug!(p, d, q, error = %e, "ARIMA candidate rejected"),
                }
            }
        }
        let best = best.ok_or_else(|| {
            ForecastError::non_convergence("ARIMA", "no candidate order could be fitted")
        })?;

        let order = ArimaOrder { p: best.p, d, q: best.q };
        let innovations = innovations(&errors, &best.phi, &best.theta, best.p);
        let sigma2 = best.css / errors.len().saturating_sub(self.bounds.max_p).max(1) as f64;

        let mut anchors = Vec::with_capacity(d);
        for level in 0..d {
            let diffed = difference_n(series, level)?;
            anchors.push(diffed.last().copied().unwrap_or_default());
        }
        let regressor_tails = (0..k)
            .map(|j| {
                let column = regressors.column(j);
                column[column.len() - d..].to_vec()
            })
            .collect();
        let coefficients = regression.coefficients();

        debug!(%order, aicc = best.aicc, "ARIMA order selected");
        Ok(TrainedArima {
            name: format!("ARIMA{}", order),
            order,
            intercept: coefficients[0],
            beta: coefficients[1..].to_vec(),
            error_tail: tail(&errors, best.p),
            innovation_tail: tail(&innovations, best.q),
            phi: best.phi,
            theta: best.theta,
            anchors,
            regressor_tails,
            sigma2,
            aicc: best.aicc,
        })
    }

    fn name(&self) -> &str {
        "AutoARIMA"
    }
}

impl TrainedArima {
    /// Selected orders
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// AR coefficients of the error process
    pub fn ar_coefficients(&self) -> &[f64] {
        &self.phi
    }

    /// MA coefficients of the error process
    pub fn ma_coefficients(&self) -> &[f64] {
        &self.theta
    }

    /// Intercept and regressor coefficients of the differenced regression
    pub fn regression(&self) -> (f64, &[f64]) {
        (self.intercept, &self.beta)
    }

    /// Innovation variance
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Information criterion of the selected order
    pub fn aicc(&self) -> f64 {
        self.aicc
    }

    /// Regressor rows on the differenced scale for each horizon step
    fn differenced_future(
        &self,
        horizon: usize,
        future: &FutureRegressors,
    ) -> Vec<std::result::Result<Vec<f64>, Unavailable>> {
        let d = self.order.d;
        let columns: Vec<Vec<Option<f64>>> = self
            .regressor_tails
            .iter()
            .enumerate()
            .map(|(k, tail)| {
                let mut values: Vec<Option<f64>> = tail.iter().copied().map(Some).collect();
                values.extend(future.column(k)[..horizon].iter().map(|p| p.as_ref().ok().copied()));
                for _ in 0..d {
                    values = difference_aligned(&values);
                }
                values.split_off(d)
            })
            .collect();

        (0..horizon)
            .map(|step| {
                columns
                    .iter()
                    .zip(future.names())
                    .map(|(column, name)| {
                        column[step].ok_or_else(|| Unavailable::MissingRegressor {
                            name: name.clone(),
                            step,
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

impl TrainedForecastModel for TrainedArima {
    fn forecast(&self, horizon: usize, future: &FutureRegressors) -> Result<Vec<PointForecast>> {
        future.ensure_covers(self.beta.len(), horizon)?;

        let mut errors = self.error_tail.clone();
        let mut shocks = self.innovation_tail.clone();
        let rows = self.differenced_future(horizon, future);

        let mut points: Vec<PointForecast> = Vec::with_capacity(horizon);
        for row in rows {
            let error = arma_step(&errors, &shocks, &self.phi, &self.theta);
            errors.push(error);
            shocks.push(0.0);
            points.push(row.map(|x| {
                self.intercept + self.beta.iter().zip(&x).map(|(b, v)| b * v).sum::<f64>() + error
            }));
        }

        for anchor in self.anchors.iter().rev() {
            points = recover_levels(*anchor, &points);
        }
        Ok(points)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Both coefficient sums must stay inside the unit ball
fn admissible(coefficients: &[f64]) -> bool {
    coefficients.iter().map(|c| c.abs()).sum::<f64>() < 1.0
}

/// One-step ARMA prediction from the most recent errors and innovations
fn arma_step(errors: &[f64], shocks: &[f64], phi: &[f64], theta: &[f64]) -> f64 {
    let ar: f64 = phi
        .iter()
        .zip(errors.iter().rev())
        .map(|(c, v)| c * v)
        .sum();
    let ma: f64 = theta
        .iter()
        .zip(shocks.iter().rev())
        .map(|(c, v)| c * v)
        .sum();
    ar + ma
}

/// Innovations of an ARMA process, zero before `start`
fn innovations(series: &[f64], phi: &[f64], theta: &[f64], start: usize) -> Vec<f64> {
    let mut shocks = vec![0.0; series.len()];
    for t in start.max(phi.len())..series.len() {
        shocks[t] = series[t] - arma_step(&series[..t], &shocks[..t], phi, theta);
    }
    shocks
}

fn conditional_sse(series: &[f64], phi: &[f64], theta: &[f64], start: usize) -> f64 {
    innovations(series, phi, theta, start)[start..]
        .iter()
        .map(|e| e * e)
        .sum()
}

/// Starting values from a long autoregression followed by a lagged regression
fn hannan_rissanen(series: &[f64], p: usize, q: usize) -> Vec<f64> {
    let fallback = vec![0.0; p + q];
    let n = series.len();
    let long = (p.max(q) + 3).min(n / 4);
    if long == 0 {
        return fallback;
    }

    let rows: Vec<Vec<f64>> = (long..n)
        .map(|t| (1..=long).map(|i| series[t - i]).collect())
        .collect();
    let Ok(ar) = least_squares(&rows, &series[long..]) else {
        return fallback;
    };
    let mut shocks = vec![0.0; n];
    shocks[long..].copy_from_slice(ar.residuals());

    let start = long + q;
    if n <= start + p + q {
        return fallback;
    }
    let rows: Vec<Vec<f64>> = (start..n)
        .map(|t| {
            (1..=p)
                .map(|i| series[t - i])
                .chain((1..=q).map(|j| shocks[t - j]))
                .collect()
        })
        .collect();
    match least_squares(&rows, &series[start..]) {
        Ok(fit) => {
            let (phi, theta) = fit.coefficients().split_at(p);
            vec![shrink(phi), shrink(theta)].concat()
        }
        Err(_) => fallback,
    }
}

/// Pull a coefficient vector back inside the admissible region
fn shrink(coefficients: &[f64]) -> Vec<f64> {
    let total: f64 = coefficients.iter().map(|c| c.abs()).sum();
    if total < 0.95 {
        coefficients.to_vec()
    } else {
        coefficients.iter().map(|c| c * 0.9 / total).collect()
    }
}

fn tail(values: &[f64], len: usize) -> Vec<f64> {
    values[values.len().saturating_sub(len)..].to_vec()
}
