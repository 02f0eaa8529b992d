#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use forecast_ensemble::features::build_daily_features;
use forecast_ensemble::{EnsembleConfig, FeatureFrame};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub const NOISE_SD: f64 = 0.3;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Business days starting at `start`
pub fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut day = start;
    while dates.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(day);
        }
        day += Duration::days(1);
    }
    dates
}

/// Trend `100 + 0.2 t` plus Gaussian noise, with derived features
pub fn trending_daily(days: usize, seed: u64) -> (Vec<NaiveDate>, FeatureFrame) {
    let dates = business_days(date(2022, 1, 3), days);
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE_SD).unwrap();
    let close: Vec<f64> = (0..days)
        .map(|t| 100.0 + 0.2 * t as f64 + noise.sample(&mut rng))
        .collect();
    let volume: Vec<f64> = (0..days)
        .map(|_| 1_000_000.0 + 100_000.0 * noise.sample(&mut rng))
        .collect();

    let bars = FeatureFrame::from_dense_columns(
        dates.clone(),
        vec![("close", close), ("volume", volume)],
    )
    .unwrap();
    let daily = build_daily_features(&bars, &Default::default()).unwrap();
    (dates, daily)
}

/// Default configuration with cheaper simulation and training settings
pub fn small_config(train_start: NaiveDate, cutoff: NaiveDate) -> EnsembleConfig {
    let mut config = EnsembleConfig::default();
    config.window.train_start = train_start;
    config.window.cutoff = cutoff;
    config.garch.paths = 1_000;
    config.neural.repeats = 3;
    config.neural.epochs = 200;
    config.trees.n_estimators = 50;
    config
}

/// Gaussian white noise
pub fn white_noise(n: usize, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sd).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}
