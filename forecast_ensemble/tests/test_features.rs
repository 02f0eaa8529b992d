mod common;

use approx::assert_relative_eq;
use chrono::Weekday;
use common::{business_days, date};
use forecast_ensemble::features::{
    build_daily_features, weekly_from_daily, FeatureSpec, WeeklyReduction, DEFAULT_REGRESSORS,
};
use forecast_ensemble::FeatureFrame;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("open", WeeklyReduction::First)]
#[case("high", WeeklyReduction::Max)]
#[case("low", WeeklyReduction::Min)]
#[case("volume", WeeklyReduction::Sum)]
#[case("return", WeeklyReduction::Mean)]
#[case("rsi_diff", WeeklyReduction::Mean)]
#[case("close", WeeklyReduction::Last)]
#[case("sma_short", WeeklyReduction::Last)]
fn test_reduction_rule_per_column(#[case] name: &str, #[case] expected: WeeklyReduction) {
    assert_eq!(WeeklyReduction::for_column(name), expected);
}

#[test]
fn test_reductions_skip_undefined_values() {
    let values = || vec![None, Some(2.0), Some(5.0), None, Some(3.0)].into_iter();

    assert_eq!(WeeklyReduction::First.apply(values()), Some(2.0));
    assert_eq!(WeeklyReduction::Last.apply(values()), Some(3.0));
    assert_eq!(WeeklyReduction::Max.apply(values()), Some(5.0));
    assert_eq!(WeeklyReduction::Min.apply(values()), Some(2.0));
    assert_eq!(WeeklyReduction::Sum.apply(values()), Some(10.0));
    assert_relative_eq!(WeeklyReduction::Mean.apply(values()).unwrap(), 10.0 / 3.0);
    assert_eq!(WeeklyReduction::Mean.apply(vec![None, None].into_iter()), None);
}

#[test]
fn test_daily_features_columns_and_warm_up() {
    let dates = business_days(date(2023, 1, 2), 40);
    let close: Vec<f64> = (0..40).map(|t| 50.0 + t as f64).collect();
    let bars = FeatureFrame::from_dense_columns(
        dates,
        vec![("close", close), ("volume", vec![100.0; 40])],
    )
    .unwrap();

    let daily = build_daily_features(&bars, &FeatureSpec::default()).unwrap();

    for name in DEFAULT_REGRESSORS {
        assert!(daily.has_column(name), "missing {}", name);
    }
    assert!(daily.has_column("adjusted"));

    let close_diff = daily.column("close_diff").unwrap();
    assert_eq!(close_diff[0], None);
    assert!(close_diff[1..].iter().all(|v| *v == Some(1.0)));

    // SMA(30) is first defined at row 29, its difference at row 30
    let sma_long_diff = daily.column("sma_long_diff").unwrap();
    assert!(sma_long_diff[..30].iter().all(Option::is_none));
    assert_relative_eq!(sma_long_diff[30].unwrap(), 1.0, epsilon = 1e-9);

    let complete = daily.drop_incomplete(&DEFAULT_REGRESSORS).unwrap();
    assert_eq!(complete.len(), 10);
}

#[test]
fn test_daily_features_require_close_and_volume() {
    let dates = business_days(date(2023, 1, 2), 5);
    let bars = FeatureFrame::from_dense_columns(dates, vec![("close", vec![1.0; 5])]).unwrap();
    assert!(build_daily_features(&bars, &FeatureSpec::default()).is_err());
}

#[test]
fn test_weekly_aggregation() {
    // Two full weeks starting Monday 2023-01-02, the second missing Friday
    let dates = business_days(date(2023, 1, 2), 9);
    let daily = FeatureFrame::from_dense_columns(
        dates,
        vec![
            ("open", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
            ("high", vec![2.0, 9.0, 4.0, 5.0, 6.0, 7.0, 8.0, 12.0, 10.0]),
            ("close", vec![1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5]),
            ("volume", vec![10.0; 9]),
            ("rsi_diff", vec![1.0, 2.0, 3.0, 4.0, 5.0, 1.0, 1.0, 1.0, 1.0]),
        ],
    )
    .unwrap();

    let weekly = weekly_from_daily(&daily, Weekday::Mon).unwrap();

    assert_eq!(weekly.dates(), &[date(2023, 1, 2), date(2023, 1, 9)]);
    assert_eq!(weekly.required_column("open").unwrap(), vec![1.0, 6.0]);
    assert_eq!(weekly.required_column("high").unwrap(), vec![9.0, 12.0]);
    assert_eq!(weekly.required_column("close").unwrap(), vec![5.5, 9.5]);
    assert_eq!(weekly.required_column("volume").unwrap(), vec![50.0, 40.0]);
    assert_eq!(weekly.required_column("rsi_diff").unwrap(), vec![3.0, 1.0]);
}

#[test]
fn test_weekly_close_diff_recomputed_from_weekly_closes() {
    let dates = business_days(date(2023, 1, 2), 15);
    let close: Vec<f64> = (0..15).map(|t| 100.0 + 2.0 * t as f64).collect();
    let bars = FeatureFrame::from_dense_columns(
        dates,
        vec![("close", close), ("volume", vec![1.0; 15])],
    )
    .unwrap();
    let daily = build_daily_features(&bars, &FeatureSpec::default()).unwrap();

    let weekly = weekly_from_daily(&daily, Weekday::Mon).unwrap();

    // Weekly closes 108, 118, 128: one week of daily changes is 10, not the daily mean of 2
    assert_eq!(weekly.column("close").unwrap(), vec![Some(108.0), Some(118.0), Some(128.0)]);
    assert_eq!(weekly.column("close_diff").unwrap(), vec![None, Some(10.0), Some(10.0)]);
}
