//! Neural network autoregression, NNAR(p, k)
//!
//! A single hidden layer network maps `p` lags of the series and the `k`
//! current regressor values to the next value. Inputs and target are
//! standardised with training statistics. Several networks are trained from
//! different seeds and their forecasts averaged.

use crate::config::NeuralConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    forecast_recursively, ForecastModel, FutureRegressors, PointForecast, Regressors,
    TrainedForecastModel,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use tracing::debug;
use trade_math::regression::least_squares;
use trade_math::statistics::{mean, std_dev};

/// Neural autoregression with external regressors
#[derive(Debug, Clone)]
pub struct NeuralAutoregression {
    config: NeuralConfig,
}

/// Trained ensemble of autoregressive networks
#[derive(Debug, Clone)]
pub struct TrainedNeuralAr {
    name: String,
    lags: usize,
    target_scale: Scale,
    regressor_scales: Vec<Scale>,
    networks: Vec<Network>,
    /// Last `lags` scaled observations, oldest first
    history: Vec<f64>,
}

/// Standardisation `(v - center) / spread`
#[derive(Debug, Clone, Copy)]
struct Scale {
    center: f64,
    spread: f64,
}

impl Scale {
    fn fit(values: &[f64]) -> Self {
        let center = mean(values).unwrap_or(0.0);
        let spread = std_dev(values)
            .filter(|s| *s > 1e-12 && s.is_finite())
            .unwrap_or(1.0);
        Self { center, spread }
    }

    fn apply(&self, v: f64) -> f64 {
        (v - self.center) / self.spread
    }

    fn invert(&self, v: f64) -> f64 {
        v * self.spread + self.center
    }
}

/// Feed-forward network with one sigmoid hidden layer and a linear output.
///
/// Parameters are stored flat: hidden weights (row per unit), hidden biases,
/// output weights, output bias.
#[derive(Debug, Clone)]
struct Network {
    inputs: usize,
    hidden: usize,
    params: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Network {
    fn new(inputs: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let n_params = hidden * inputs + 2 * hidden + 1;
        let mut params = vec![0.0; n_params];
        let input_range = Uniform::new(-1.0, 1.0);
        let input_limit = 1.0 / (inputs as f64).sqrt();
        let output_limit = 1.0 / (hidden as f64).sqrt();
        for w in params[..hidden * inputs].iter_mut() {
            *w = input_range.sample(rng) * input_limit;
        }
        let out = hidden * inputs + hidden;
        for w in params[out..out + hidden].iter_mut() {
            *w = input_range.sample(rng) * output_limit;
        }
        Self {
            inputs,
            hidden,
            params,
        }
    }

    fn activations(&self, input: &[f64]) -> Vec<f64> {
        let biases = self.hidden * self.inputs;
        (0..self.hidden)
            .map(|j| {
                let weights = &self.params[j * self.inputs..(j + 1) * self.inputs];
                let z: f64 = weights.iter().zip(input).map(|(w, u)| w * u).sum();
                sigmoid(z + self.params[biases + j])
            })
            .collect()
    }

    fn predict(&self, input: &[f64]) -> f64 {
        let out = self.hidden * self.inputs + self.hidden;
        let hidden = self.activations(input);
        let weights = &self.params[out..out + self.hidden];
        weights.iter().zip(&hidden).map(|(w, a)| w * a).sum::<f64>() + self.params[out + self.hidden]
    }

    /// Gradient of half the mean squared error plus an L2 penalty on weights
    fn gradient(&self, rows: &[Vec<f64>], targets: &[f64], weight_decay: f64) -> Vec<f64> {
        let (h, m) = (self.hidden, self.inputs);
        let biases = h * m;
        let out = biases + h;
        let n = rows.len() as f64;
        let mut grad = vec![0.0; self.params.len()];

        for (input, target) in rows.iter().zip(targets) {
            let hidden = self.activations(input);
            let prediction = self.params[out..out + h]
                .iter()
                .zip(&hidden)
                .map(|(w, a)| w * a)
                .sum::<f64>()
                + self.params[out + h];
            let delta = (prediction - target) / n;

            grad[out + h] += delta;
            for j in 0..h {
                grad[out + j] += delta * hidden[j];
                let dz = delta * self.params[out + j] * hidden[j] * (1.0 - hidden[j]);
                grad[biases + j] += dz;
                for (i, u) in input.iter().enumerate() {
                    grad[j * m + i] += dz * u;
                }
            }
        }

        for idx in (0..biases).chain(out..out + h) {
            grad[idx] += weight_decay * self.params[idx];
        }
        grad
    }
}

/// Adam optimiser state for a flat parameter vector
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    fn new(learning_rate: f64, n_params: usize) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            t: 0,
        }
    }

    fn apply_gradients(&mut self, params: &mut [f64], gradients: &[f64]) {
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t);

        for (i, (p, g)) in params.iter_mut().zip(gradients).enumerate() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = self.m[i] / bias_correction1;
            let v_hat = self.v[i] / bias_correction2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

/// AR order with the smallest AIC among linear autoregressions `1..=max_lags`.
///
/// All candidates are fitted on the same sample so their criteria compare.
pub fn select_ar_order(series: &[f64], max_lags: usize) -> Result<usize> {
    let n = series.len();
    let max_lags = max_lags.min(n.saturating_sub(3) / 2);
    if max_lags == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "{} observations are too few for an autoregression",
            n
        )));
    }

    let target = &series[max_lags..];
    let n_eff = target.len() as f64;
    let mut best = (1, f64::INFINITY);
    for p in 1..=max_lags {
        let rows: Vec<Vec<f64>> = (max_lags..n)
            .map(|t| std::iter::once(1.0).chain((1..=p).map(|i| series[t - i])).collect())
            .collect();
        let fit = least_squares(&rows, target)?;
        let sigma2 = (fit.sse() / n_eff).max(f64::MIN_POSITIVE);
        let aic = n_eff * sigma2.ln() + 2.0 * (p as f64 + 1.0);
        if aic < best.1 {
            best = (p, aic);
        }
    }
    Ok(best.0)
}

impl NeuralAutoregression {
    /// Create a model from its configuration
    pub fn new(config: NeuralConfig) -> Self {
        Self { config }
    }

    fn train_network(
        &self,
        rows: &[Vec<f64>],
        targets: &[f64],
        hidden: usize,
        repeat: usize,
    ) -> Network {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(repeat as u64));
        let mut network = Network::new(rows[0].len(), hidden, &mut rng);
        let mut adam = Adam::new(self.config.learning_rate, network.params.len());
        for _ in 0..self.config.epochs {
            let grad = network.gradient(rows, targets, self.config.weight_decay);
            adam.apply_gradients(&mut network.params, &grad);
        }
        network
    }
}

impl ForecastModel for NeuralAutoregression {
    type Trained = TrainedNeuralAr;

    fn train(&self, series: &[f64], regressors: &Regressors) -> Result<TrainedNeuralAr> {
        regressors.ensure_len(series.len())?;
        let lags = select_ar_order(series, self.config.max_lags)?;
        let k = regressors.width();
        let hidden = ((lags + k + 1) as f64 / 2.0).round().max(1.0) as usize;

        let target_scale = Scale::fit(series);
        let regressor_scales: Vec<Scale> = (0..k).map(|j| Scale::fit(regressors.column(j))).collect();
        let scaled: Vec<f64> = series.iter().map(|v| target_scale.apply(*v)).collect();

        let rows: Vec<Vec<f64>> = (lags..series.len())
            .map(|t| {
                let lagged = (1..=lags).map(|i| scaled[t - i]);
                let current = regressor_scales
                    .iter()
                    .enumerate()
                    .map(|(j, s)| s.apply(regressors.column(j)[t]));
                lagged.chain(current).collect()
            })
            .collect();
        let targets = &scaled[lags..];

        let networks: Vec<Network> = (0..self.config.repeats)
            .into_par_iter()
            .map(|repeat| self.train_network(&rows, targets, hidden, repeat))
            .collect();

        if networks
            .iter()
            .any(|net| net.params.iter().any(|p| !p.is_finite()))
        {
            return Err(ForecastError::non_convergence(
                "NNAR",
                "network weights diverged",
            ));
        }

        debug!(lags, hidden, regressors = k, "NNAR trained");
        Ok(TrainedNeuralAr {
            name: format!("NNAR({},{})", lags, hidden),
            lags,
            target_scale,
            regressor_scales,
            networks,
            history: scaled[series.len() - lags..].to_vec(),
        })
    }

    fn name(&self) -> &str {
        "NNAR"
    }
}

impl TrainedNeuralAr {
    /// Number of lagged inputs
    pub fn lags(&self) -> usize {
        self.lags
    }

    /// Number of averaged networks
    pub fn repeats(&self) -> usize {
        self.networks.len()
    }

    fn step(&self, history: &[f64], regressors: &[f64]) -> f64 {
        let input: Vec<f64> = history
            .iter()
            .rev()
            .copied()
            .chain(
                self.regressor_scales
                    .iter()
                    .zip(regressors)
                    .map(|(s, v)| s.apply(*v)),
            )
            .collect();
        let total: f64 = self.networks.iter().map(|net| net.predict(&input)).sum();
        total / self.networks.len() as f64
    }
}

impl TrainedForecastModel for TrainedNeuralAr {
    fn forecast(&self, horizon: usize, future: &FutureRegressors) -> Result<Vec<PointForecast>> {
        future.ensure_covers(self.regressor_scales.len(), horizon)?;

        forecast_recursively(horizon, future, self.history.clone(), |history, row| {
            let next = self.step(history, row);
            let mut shifted = history[1..].to_vec();
            shifted.push(next);
            Ok((shifted, self.target_scale.invert(next)))
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
