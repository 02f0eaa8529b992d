use chrono::{Datelike, Duration, NaiveDate, Weekday};
use forecast_ensemble::features::build_daily_features;
use forecast_ensemble::{run_symbol, EnsembleConfig, FeatureFrame, Strategy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Business days starting at `start`
fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).ok_or("invalid start date")?;
    let dates = business_days(start, 300);

    // Linear trend plus small noise
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.3)?;
    let close: Vec<f64> = (0..dates.len())
        .map(|t| 100.0 + 0.2 * t as f64 + noise.sample(&mut rng))
        .collect();
    let volume: Vec<f64> = (0..dates.len())
        .map(|_| 1_000_000.0 + 50_000.0 * noise.sample(&mut rng))
        .collect();

    let bars = FeatureFrame::from_dense_columns(
        dates.clone(),
        vec![("close", close), ("volume", volume)],
    )?;
    let daily = build_daily_features(&bars, &Default::default())?;

    let mut config = EnsembleConfig::default();
    config.window.train_start = dates[0];
    config.window.cutoff = dates[249];
    config.garch.paths = 2_000;
    config.neural.repeats = 5;

    let report = run_symbol("SYNTH", &daily, &config)?;

    println!("Weeks forecast: {}", report.weeks.len());
    for strategy in Strategy::COMPONENTS.iter().chain([Strategy::Ensemble].iter()) {
        if let Some(record) = report.record(*strategy) {
            println!("{}", record);
        }
    }

    if let Some(ensemble) = report.forecast(Strategy::Ensemble) {
        println!("\nWeek        Actual    Ensemble");
        for ((week, actual), value) in report.weeks.iter().zip(&report.actual).zip(ensemble.values()) {
            match value {
                Some(v) => println!("{}  {:>8.2}  {:>8.2}", week, actual, v),
                None => println!("{}  {:>8.2}       n/a", week, actual),
            }
        }
    }

    Ok(())
}
