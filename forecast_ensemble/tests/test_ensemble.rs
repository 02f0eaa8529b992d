mod common;

use common::date;
use forecast_ensemble::ensemble::{align_to_index, combine};
use forecast_ensemble::level::recover_levels;
use forecast_ensemble::{ForecastError, ForecastResult, PointForecast, Strategy, Unavailable};
use pretty_assertions::assert_eq;

fn weeks() -> Vec<chrono::NaiveDate> {
    vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]
}

fn result(values: &[f64]) -> ForecastResult {
    ForecastResult::new(weeks(), values.iter().copied().map(Ok).collect()).unwrap()
}

#[test]
fn test_recover_levels_cumulates_differences() {
    let diffs: Vec<PointForecast> = vec![Ok(1.0), Ok(-0.5), Ok(2.0)];
    assert_eq!(recover_levels(10.0, &diffs), vec![Ok(11.0), Ok(10.5), Ok(12.5)]);
    assert!(recover_levels(10.0, &[]).is_empty());
}

#[test]
fn test_recover_levels_stops_at_first_gap() {
    let gap = Unavailable::MissingRegressor {
        name: "rsi_diff".to_string(),
        step: 1,
    };
    let diffs: Vec<PointForecast> = vec![Ok(1.0), Err(gap.clone()), Ok(2.0), Ok(3.0)];

    let levels = recover_levels(10.0, &diffs);

    assert_eq!(levels[0], Ok(11.0));
    assert_eq!(levels[1], Err(gap));
    assert_eq!(levels[2], Err(Unavailable::PriorStep { step: 1 }));
    assert_eq!(levels[3], Err(Unavailable::PriorStep { step: 1 }));
}

#[test]
fn test_combine_is_equal_weight_mean() {
    let arimax = result(&[100.0, 101.0, 102.0]);
    let neural = result(&[102.0, 103.0, 104.0]);
    let trees = result(&[98.0, 99.0, 100.0]);
    let mc = result(&[104.0, 105.0, 106.0]);

    let ensemble = combine(&[
        (Strategy::Arimax, &arimax),
        (Strategy::NeuralAr, &neural),
        (Strategy::RecursiveTree, &trees),
        (Strategy::GarchMonteCarlo, &mc),
    ])
    .unwrap();

    assert_eq!(ensemble.dates(), weeks().as_slice());
    assert_eq!(ensemble.points(), &[Ok(101.0), Ok(102.0), Ok(103.0)]);
}

#[test]
fn test_combine_rejects_misaligned_components() {
    let full = result(&[1.0, 2.0, 3.0]);
    let short = ForecastResult::new(weeks()[..2].to_vec(), vec![Ok(1.0), Ok(2.0)]).unwrap();
    let shifted = ForecastResult::new(
        vec![date(2024, 1, 8), date(2024, 1, 15), date(2024, 1, 22)],
        vec![Ok(1.0), Ok(2.0), Ok(3.0)],
    )
    .unwrap();

    let err = combine(&[(Strategy::Arimax, &full), (Strategy::NeuralAr, &short)]).unwrap_err();
    assert!(matches!(err, ForecastError::AlignmentMismatch(_)));

    let err = combine(&[(Strategy::Arimax, &full), (Strategy::NeuralAr, &shifted)]).unwrap_err();
    assert!(matches!(err, ForecastError::AlignmentMismatch(_)));

    assert!(combine(&[]).is_err());
}

#[test]
fn test_combine_marks_weeks_with_missing_component() {
    let arimax = result(&[1.0, 2.0, 3.0]);
    let neural = ForecastResult::new(
        weeks(),
        vec![Ok(3.0), Err(Unavailable::PriorStep { step: 0 }), Ok(5.0)],
    )
    .unwrap();

    let ensemble = combine(&[(Strategy::Arimax, &arimax), (Strategy::NeuralAr, &neural)]).unwrap();

    assert_eq!(ensemble.points()[0], Ok(2.0));
    assert_eq!(
        ensemble.points()[1],
        Err(Unavailable::MissingComponent {
            strategy: Strategy::NeuralAr
        })
    );
    assert_eq!(ensemble.points()[2], Ok(4.0));
    assert_eq!(ensemble.available_count(), 2);
}

#[test]
fn test_align_drops_extra_weeks_and_marks_missing_ones() {
    // Monte Carlo weeks start one week early and skip the last index week
    let mc_weeks = vec![date(2023, 12, 25), date(2024, 1, 1), date(2024, 1, 8)];
    let points: Vec<PointForecast> = vec![Ok(99.0), Ok(100.0), Ok(101.0)];

    let (aligned, dropped) = align_to_index(&mc_weeks, &points, &weeks()).unwrap();

    assert_eq!(dropped, vec![date(2023, 12, 25)]);
    assert_eq!(aligned.dates(), weeks().as_slice());
    assert_eq!(
        aligned.points(),
        &[Ok(100.0), Ok(101.0), Err(Unavailable::MissingWeek)]
    );
}

#[test]
fn test_align_requires_matching_lengths() {
    let err = align_to_index(&weeks(), &[Ok(1.0)], &weeks()).unwrap_err();
    assert!(matches!(err, ForecastError::AlignmentMismatch(_)));
}
