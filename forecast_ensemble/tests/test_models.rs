mod common;

use approx::assert_relative_eq;
use common::white_noise;
use forecast_ensemble::config::{ArimaConfig, NeuralConfig, TreeConfig};
use forecast_ensemble::models::arima::AutoArima;
use forecast_ensemble::models::garch::ArGarchFit;
use forecast_ensemble::models::neural::{select_ar_order, NeuralAutoregression};
use forecast_ensemble::models::trees::{LagTreeForecaster, RecursiveTreeForecaster};
use forecast_ensemble::models::{fit_forecast, FutureRegressors, Regressors};
use forecast_ensemble::{
    ForecastError, ForecastModel, PointForecast, TrainedForecastModel, Unavailable,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use trade_math::optimize::NelderMead;

fn minimizer() -> NelderMead {
    NelderMead::new(2000, 1e-8).unwrap()
}

fn names(n: &[&str]) -> Vec<String> {
    n.iter().map(|s| s.to_string()).collect()
}

fn random_walk(n: usize, seed: u64) -> Vec<f64> {
    white_noise(n, 1.0, seed)
        .into_iter()
        .scan(50.0, |level, e| {
            *level += e;
            Some(*level)
        })
        .collect()
}

/// `x_t = mean + phi (x_{t-1} - mean) + e_t`
fn ar1(n: usize, mean: f64, phi: f64, sd: f64, seed: u64) -> Vec<f64> {
    white_noise(n, sd, seed)
        .into_iter()
        .scan(mean, |x, e| {
            *x = mean + phi * (*x - mean) + e;
            Some(*x)
        })
        .collect()
}

fn values(points: &[PointForecast]) -> Vec<f64> {
    points.iter().map(|p| *p.as_ref().unwrap()).collect()
}

#[test]
fn test_arimax_recovers_regression_coefficients() {
    let x = white_noise(150, 1.0, 1);
    let noise = white_noise(150, 0.1, 2);
    let y: Vec<f64> = x.iter().zip(&noise).map(|(x, e)| 2.0 + 3.0 * x + e).collect();
    let regressors = Regressors::new(names(&["x"]), vec![x]).unwrap();

    let bounds = ArimaConfig {
        max_d: 0,
        ..Default::default()
    };
    let trained = AutoArima::new(bounds, minimizer()).train(&y, &regressors).unwrap();

    assert_eq!(trained.order().d, 0);
    let (intercept, beta) = trained.regression();
    assert_relative_eq!(intercept, 2.0, epsilon = 0.05);
    assert_relative_eq!(beta[0], 3.0, epsilon = 0.05);
    assert!(trained.sigma2() > 0.0 && trained.sigma2() < 0.05);

    let future = FutureRegressors::from_values(names(&["x"]), vec![vec![0.5, 1.0, -1.0]]).unwrap();
    let forecast = values(&trained.forecast(3, &future).unwrap());
    assert_relative_eq!(forecast[0], 3.5, epsilon = 0.3);
    assert_relative_eq!(forecast[1], 5.0, epsilon = 0.3);
    assert_relative_eq!(forecast[2], -1.0, epsilon = 0.3);
}

#[test]
fn test_arima_differences_a_random_walk() {
    let series = random_walk(200, 3);
    let last = *series.last().unwrap();

    let model = AutoArima::new(ArimaConfig::default(), minimizer());
    assert_eq!(model.select_d(&series), 1);

    let trained = model.train(&series, &Regressors::empty()).unwrap();
    assert_eq!(trained.order().d, 1);
    assert!(trained.name().starts_with("ARIMA("));

    let forecast = values(&trained.forecast(4, &FutureRegressors::empty()).unwrap());
    assert_eq!(forecast.len(), 4);
    assert_relative_eq!(forecast[0], last, epsilon = 1.5);
}

#[test]
fn test_arimax_missing_regressor_marks_dependent_steps() {
    let x = white_noise(200, 1.0, 4);
    let walk = random_walk(200, 5);
    let y: Vec<f64> = walk.iter().zip(&x).map(|(w, x)| w + 3.0 * x).collect();
    let regressors = Regressors::new(names(&["x"]), vec![x]).unwrap();

    let trained = AutoArima::new(ArimaConfig::default(), minimizer())
        .train(&y, &regressors)
        .unwrap();
    assert_eq!(trained.order().d, 1);

    let future = FutureRegressors::new(
        names(&["x"]),
        vec![vec![
            Ok(0.1),
            Err(Unavailable::FitFailed {
                model: "auto-ARIMA for x".to_string(),
                reason: "singular".to_string(),
            }),
            Ok(0.2),
        ]],
    )
    .unwrap();
    let points = trained.forecast(3, &future).unwrap();

    assert!(points[0].is_ok());
    assert_eq!(
        points[1],
        Err(Unavailable::MissingRegressor {
            name: "x".to_string(),
            step: 1
        })
    );
    assert!(points[2].is_err());
}

#[test]
fn test_regressor_width_mismatch_is_an_error() {
    let x = white_noise(100, 1.0, 6);
    let y: Vec<f64> = x.iter().map(|v| 1.0 + v).collect();
    let regressors = Regressors::new(names(&["x"]), vec![x]).unwrap();
    let bounds = ArimaConfig {
        max_d: 0,
        ..Default::default()
    };
    let trained = AutoArima::new(bounds, minimizer()).train(&y, &regressors).unwrap();

    assert!(trained.forecast(2, &FutureRegressors::empty()).is_err());
}

#[test]
fn test_ar_order_selection() {
    // AR(2) with a strong second lag; an AR(1) fit is clearly misspecified
    let noise = white_noise(400, 1.0, 7);
    let mut series = vec![0.0, 0.0];
    for e in &noise {
        let n = series.len();
        series.push(0.5 * series[n - 1] - 0.6 * series[n - 2] + e);
    }

    let p = select_ar_order(&series, 4).unwrap();
    assert!((2..=4).contains(&p), "selected order {}", p);

    assert!(select_ar_order(&[1.0, 2.0, 3.0, 4.0], 4).is_err());
}

#[test]
fn test_nnar_forecasts_a_stationary_series_near_its_mean() {
    let series = ar1(200, 1.0, 0.5, 0.1, 8);
    let config = NeuralConfig {
        repeats: 3,
        epochs: 300,
        ..Default::default()
    };

    let trained = NeuralAutoregression::new(config)
        .train(&series, &Regressors::empty())
        .unwrap();
    assert_eq!(trained.repeats(), 3);
    assert!(trained.lags() >= 1);

    let forecast = values(&trained.forecast(5, &FutureRegressors::empty()).unwrap());
    for v in &forecast {
        assert_relative_eq!(*v, 1.0, epsilon = 0.3);
    }

    let again = NeuralAutoregression::new(config)
        .train(&series, &Regressors::empty())
        .unwrap();
    assert_eq!(
        again.forecast(5, &FutureRegressors::empty()).unwrap(),
        trained.forecast(5, &FutureRegressors::empty()).unwrap()
    );
}

#[test]
fn test_nnar_with_regressor_stops_at_missing_value() {
    let x = white_noise(150, 1.0, 9);
    let noise = white_noise(150, 0.1, 10);
    let series: Vec<f64> = x.iter().zip(&noise).map(|(x, e)| 0.5 * x + e).collect();
    let regressors = Regressors::new(names(&["x"]), vec![x]).unwrap();
    let config = NeuralConfig {
        repeats: 2,
        epochs: 100,
        ..Default::default()
    };

    let trained = NeuralAutoregression::new(config).train(&series, &regressors).unwrap();
    let future = FutureRegressors::new(
        names(&["x"]),
        vec![vec![Ok(0.0), Err(Unavailable::MissingWeek), Ok(0.0), Ok(0.0)]],
    )
    .unwrap();
    let points = trained.forecast(4, &future).unwrap();

    assert!(points[0].is_ok());
    assert_eq!(
        points[1],
        Err(Unavailable::MissingRegressor {
            name: "x".to_string(),
            step: 1
        })
    );
    assert_eq!(points[2], Err(Unavailable::PriorStep { step: 1 }));
    assert_eq!(points[3], Err(Unavailable::PriorStep { step: 1 }));
}

#[test]
fn test_recursive_trees_follow_a_noise_free_trend() {
    let series: Vec<f64> = (0..60).map(|t| 10.0 + 0.5 * t as f64).collect();
    let last = *series.last().unwrap();
    let config = TreeConfig {
        n_estimators: 20,
        ..Default::default()
    };
    let model = RecursiveTreeForecaster::new(config);

    let points = fit_forecast(&model, &series, &Regressors::empty(), 4, &FutureRegressors::empty())
        .unwrap();
    let forecast = values(&points);
    for (k, v) in forecast.iter().enumerate() {
        assert_relative_eq!(*v, last + 0.5 * (k + 1) as f64, epsilon = 1e-9);
    }

    let repeat = fit_forecast(&model, &series, &Regressors::empty(), 4, &FutureRegressors::empty())
        .unwrap();
    assert_eq!(points, repeat);
}

#[test]
fn test_recursive_trees_propagate_missing_regressor() {
    let series: Vec<f64> = (0..40).map(|t| t as f64).collect();
    let regressors = Regressors::new(names(&["x"]), vec![white_noise(40, 1.0, 11)]).unwrap();
    let trained = RecursiveTreeForecaster::new(TreeConfig::default())
        .train(&series, &regressors)
        .unwrap();

    let future = FutureRegressors::new(
        names(&["x"]),
        vec![vec![Ok(0.0), Err(Unavailable::MissingWeek), Ok(0.0)]],
    )
    .unwrap();
    let points = trained.forecast(3, &future).unwrap();

    assert!(points[0].is_ok());
    assert!(matches!(points[1], Err(Unavailable::MissingRegressor { step: 1, .. })));
    assert_eq!(points[2], Err(Unavailable::PriorStep { step: 1 }));

    assert!(trained.forecast(3, &FutureRegressors::empty()).is_err());
}

#[test]
fn test_recursive_trees_need_three_levels() {
    let err = RecursiveTreeForecaster::new(TreeConfig::default())
        .train(&[1.0, 2.0], &Regressors::empty())
        .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
}

#[test]
fn test_lag_trees_are_deterministic_and_reject_regressors() {
    let series = ar1(120, 5.0, 0.6, 0.5, 12);
    let model = LagTreeForecaster::new(TreeConfig::default());

    let first = model.train(&series, &Regressors::empty()).unwrap();
    let second = model.train(&series, &Regressors::empty()).unwrap();
    let a = first.forecast_values(6).unwrap();
    assert_eq!(a, second.forecast_values(6).unwrap());
    assert!(a.iter().all(|v| v.is_finite()));

    let regressors = Regressors::new(names(&["x"]), vec![vec![0.0; 120]]).unwrap();
    assert!(model.train(&series, &regressors).is_err());
}

fn garch_returns(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let (omega, alpha, beta): (f64, f64, f64) = (0.05, 0.1, 0.85);
    let mut h = omega / (1.0 - alpha - beta);
    let mut previous = 0.0;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let e = h.sqrt() * normal.sample(&mut rng);
        let r = 0.1 + 0.2 * previous + e;
        out.push(r);
        h = omega + alpha * e * e + beta * h;
        previous = r;
    }
    out
}

#[test]
fn test_garch_fit_stays_in_the_admissible_region() {
    let returns = garch_returns(1500, 13);

    let fit = ArGarchFit::fit(&returns, &Regressors::empty(), None, &minimizer()).unwrap();
    let params = fit.params();

    assert!(params.omega > 0.0);
    assert!(params.alpha > 0.0 && params.beta > 0.0);
    assert!(params.persistence() < 1.0);
    assert_relative_eq!(fit.ar_coefficient(), 0.2, epsilon = 0.1);
    assert!(fit.next_volatility().is_finite() && fit.next_volatility() > 0.0);
    assert!(fit.log_likelihood().is_finite());
    assert_eq!(fit.last_return(), *returns.last().unwrap());
    assert_relative_eq!(
        fit.next_mean(),
        fit.intercept() + fit.ar_coefficient() * fit.last_return(),
        epsilon = 1e-12
    );

    // Warm-started refit on one more observation lands close to the first
    let mut extended = returns.clone();
    extended.push(0.1);
    let refit = ArGarchFit::fit(&extended, &Regressors::empty(), Some(params), &minimizer()).unwrap();
    assert_relative_eq!(refit.params().persistence(), params.persistence(), epsilon = 0.05);
}

#[test]
fn test_garch_rejects_short_and_degenerate_windows() {
    let err = ArGarchFit::fit(&[0.1; 5], &Regressors::empty(), None, &minimizer()).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));

    // An exactly linear return sequence leaves no residual variance
    let linear: Vec<f64> = (0..40).map(|t| 0.5_f64.powi(t)).collect();
    assert!(ArGarchFit::fit(&linear, &Regressors::empty(), None, &minimizer()).is_err());
}

#[test]
fn test_garch_mean_equation_carries_regressors() {
    let x = white_noise(800, 1.0, 21);
    let returns: Vec<f64> = garch_returns(800, 22)
        .iter()
        .zip(&x)
        .map(|(r, x)| r + 0.5 * x)
        .collect();
    let regressors = Regressors::new(names(&["x"]), vec![x]).unwrap();

    let fit = ArGarchFit::fit(&returns, &regressors, None, &minimizer()).unwrap();

    assert_eq!(fit.regressor_coefficients().len(), 1);
    assert_relative_eq!(fit.regressor_coefficients()[0], 0.5, epsilon = 0.1);
    assert_relative_eq!(fit.intercept(), 0.1, epsilon = 0.1);
    assert_relative_eq!(
        fit.mean_after(0.2, &[2.0]),
        fit.intercept() + 0.2 * fit.ar_coefficient() + 2.0 * fit.regressor_coefficients()[0],
        epsilon = 1e-12
    );
}

/// Replays fixed values as its forecast
#[derive(Debug, Clone)]
struct Replay(Vec<f64>);

#[derive(Debug)]
struct ReplayFit(Vec<f64>);

impl ForecastModel for Replay {
    type Trained = ReplayFit;

    fn train(&self, _series: &[f64], _regressors: &Regressors) -> forecast_ensemble::Result<ReplayFit> {
        Ok(ReplayFit(self.0.clone()))
    }

    fn name(&self) -> &str {
        "replay"
    }
}

impl TrainedForecastModel for ReplayFit {
    fn forecast(
        &self,
        horizon: usize,
        _future: &FutureRegressors,
    ) -> forecast_ensemble::Result<Vec<PointForecast>> {
        Ok(self.0.iter().take(horizon).copied().map(Ok).collect())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[test]
fn test_non_finite_point_makes_later_points_unavailable() {
    let model = Replay(vec![1.0, f64::NAN, 3.0, 4.0]);
    let points = fit_forecast(
        &model,
        &[1.0, 2.0],
        &Regressors::empty(),
        4,
        &FutureRegressors::empty(),
    )
    .unwrap();

    assert_eq!(points[0], Ok(1.0));
    assert!(matches!(points[1], Err(Unavailable::FitFailed { .. })));
    assert_eq!(points[2], Err(Unavailable::PriorStep { step: 1 }));
    assert_eq!(points[3], Err(Unavailable::PriorStep { step: 1 }));
}
