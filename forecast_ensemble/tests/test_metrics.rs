mod common;

use approx::assert_relative_eq;
use common::{business_days, date};
use forecast_ensemble::metrics::evaluate;
use forecast_ensemble::{ForecastResult, PointForecast, Strategy, Unavailable};

fn forecast(points: Vec<PointForecast>) -> ForecastResult {
    ForecastResult::new(business_days(date(2024, 1, 1), points.len()), points).unwrap()
}

#[test]
fn test_mape_and_mse() {
    let f = forecast(vec![Ok(110.0), Ok(95.0), Ok(100.0)]);
    let actual = [100.0, 100.0, 100.0];

    let record = evaluate("ABC", Strategy::Arimax, &f, &actual).unwrap();

    // (10% + 5% + 0%) / 3 and (100 + 25 + 0) / 3
    assert_relative_eq!(record.mape.unwrap(), 5.0, epsilon = 1e-10);
    assert_relative_eq!(record.mse.unwrap(), 125.0 / 3.0, epsilon = 1e-10);
    assert_eq!(record.evaluated, 3);
    assert_eq!(record.excluded, 0);
    assert!(record.is_defined());
    assert_eq!(record.symbol, "ABC");
}

#[test]
fn test_perfect_forecast_scores_zero() {
    let f = forecast(vec![Ok(10.0), Ok(20.0)]);
    let record = evaluate("ABC", Strategy::Ensemble, &f, &[10.0, 20.0]).unwrap();

    assert_eq!(record.mape, Some(0.0));
    assert_eq!(record.mse, Some(0.0));
}

#[test]
fn test_unavailable_points_are_excluded() {
    let f = forecast(vec![
        Ok(110.0),
        Err(Unavailable::MissingWeek),
        Err(Unavailable::PriorStep { step: 1 }),
    ]);

    let record = evaluate("ABC", Strategy::GarchMonteCarlo, &f, &[100.0, 50.0, 1.0]).unwrap();

    assert_relative_eq!(record.mape.unwrap(), 10.0, epsilon = 1e-10);
    assert_relative_eq!(record.mse.unwrap(), 100.0, epsilon = 1e-10);
    assert_eq!(record.evaluated, 1);
    assert_eq!(record.excluded, 2);
}

#[test]
fn test_zero_actual_only_enters_mse() {
    let f = forecast(vec![Ok(1.0), Ok(110.0)]);

    let record = evaluate("ABC", Strategy::NeuralAr, &f, &[0.0, 100.0]).unwrap();

    assert_relative_eq!(record.mape.unwrap(), 10.0, epsilon = 1e-10);
    assert_relative_eq!(record.mse.unwrap(), 50.5, epsilon = 1e-10);
    assert_eq!(record.evaluated, 2);
}

#[test]
fn test_nothing_to_evaluate_gives_no_metrics() {
    let f = forecast(vec![Err(Unavailable::MissingWeek), Err(Unavailable::MissingWeek)]);

    let record = evaluate("ABC", Strategy::RecursiveTree, &f, &[1.0, 2.0]).unwrap();

    assert_eq!(record.mape, None);
    assert_eq!(record.mse, None);
    assert!(!record.is_defined());
    assert!(record.to_string().contains("n/a"));
}

#[test]
fn test_length_mismatch_is_an_error() {
    let f = forecast(vec![Ok(1.0)]);
    assert!(evaluate("ABC", Strategy::Arimax, &f, &[1.0, 2.0]).is_err());
}

#[test]
fn test_record_display() {
    let f = forecast(vec![Ok(110.0)]);
    let record = evaluate("XYZ", Strategy::Arimax, &f, &[100.0]).unwrap();
    let text = record.to_string();

    assert!(text.contains("XYZ"));
    assert!(text.contains("ARIMAX"));
    assert!(text.contains("10.0000%"));
}
