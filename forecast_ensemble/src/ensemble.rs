//! Weekly alignment and the equal-weight ensemble
//!
//! Every component is expressed on the weekly test index before it reaches
//! [`combine`]. Re-indexing is explicit through [`align_to_index`]; the
//! combiner itself never truncates or shifts a series.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, PointForecast, Strategy, Unavailable};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

/// Re-index dated values onto `index`.
///
/// Dates outside `index` are dropped and reported; index dates without a
/// value become [`Unavailable::MissingWeek`].
pub fn align_to_index(
    dates: &[NaiveDate],
    points: &[PointForecast],
    index: &[NaiveDate],
) -> Result<(ForecastResult, Vec<NaiveDate>)> {
    if dates.len() != points.len() {
        return Err(ForecastError::AlignmentMismatch(format!(
            "{} dates for {} points",
            dates.len(),
            points.len()
        )));
    }
    let by_date: HashMap<NaiveDate, &PointForecast> = dates.iter().copied().zip(points).collect();

    let aligned = index
        .iter()
        .map(|week| {
            by_date
                .get(week)
                .map(|p| (*p).clone())
                .unwrap_or(Err(Unavailable::MissingWeek))
        })
        .collect();
    let dropped: Vec<NaiveDate> = dates
        .iter()
        .filter(|d| index.binary_search(d).is_err())
        .copied()
        .collect();
    if !dropped.is_empty() {
        warn!(dropped = dropped.len(), "forecast weeks outside the test index dropped");
    }

    Ok((ForecastResult::new(index.to_vec(), aligned)?, dropped))
}

/// Equal-weight mean of the component forecasts.
///
/// All components must share exactly the same dates. A week where any
/// component is unavailable is unavailable in the ensemble.
pub fn combine(components: &[(Strategy, &ForecastResult)]) -> Result<ForecastResult> {
    let (_, first) = components.first().ok_or_else(|| {
        ForecastError::AlignmentMismatch("no components to combine".to_string())
    })?;
    for (strategy, result) in components {
        if result.dates() != first.dates() {
            return Err(ForecastError::AlignmentMismatch(format!(
                "{} covers {} weeks ({:?} to {:?}), expected {} weeks ({:?} to {:?})",
                strategy,
                result.len(),
                result.dates().first(),
                result.dates().last(),
                first.len(),
                first.dates().first(),
                first.dates().last()
            )));
        }
    }

    let count = components.len() as f64;
    let points = (0..first.len())
        .map(|idx| {
            let mut total = 0.0;
            for (strategy, result) in components {
                match &result.points()[idx] {
                    Ok(v) => total += v,
                    Err(_) => {
                        return Err(Unavailable::MissingComponent {
                            strategy: *strategy,
                        })
                    }
                }
            }
            Ok(total / count)
        })
        .collect();

    ForecastResult::new(first.dates().to_vec(), points)
}
