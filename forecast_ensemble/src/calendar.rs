//! Weekly bucketing of daily observations

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// First day of the week containing `date`, weeks beginning on `start`
pub fn week_start(date: NaiveDate, start: Weekday) -> NaiveDate {
    let offset =
        (date.weekday().num_days_from_monday() + 7 - start.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(offset))
}

/// Group consecutive dated values into weeks.
///
/// Returns `(week_start, indices)` pairs in date order. `dates` must be sorted.
pub fn week_buckets(dates: &[NaiveDate], start: Weekday) -> Vec<(NaiveDate, Vec<usize>)> {
    let mut buckets: Vec<(NaiveDate, Vec<usize>)> = Vec::new();
    for (idx, date) in dates.iter().enumerate() {
        let week = week_start(*date, start);
        match buckets.last_mut() {
            Some((current, members)) if *current == week => members.push(idx),
            _ => buckets.push((week, vec![idx])),
        }
    }
    buckets
}

/// Last date a weekly training window may include so that no week in it has
/// observations after `cutoff`.
///
/// When `dates` continue past `cutoff` inside the week containing it, that week
/// is left to the test window and the weekly cutoff moves to the day before it.
pub fn complete_week_cutoff(dates: &[NaiveDate], cutoff: NaiveDate, start: Weekday) -> NaiveDate {
    let week = week_start(cutoff, start);
    let straddles = dates
        .iter()
        .any(|d| *d > cutoff && week_start(*d, start) == week);
    if straddles {
        week.pred_opt().unwrap_or(NaiveDate::MIN)
    } else {
        cutoff
    }
}

/// Reduce daily values to one value per week by keeping the last observation
pub fn last_by_week<T: Clone>(
    dates: &[NaiveDate],
    values: &[T],
    start: Weekday,
) -> (Vec<NaiveDate>, Vec<T>) {
    week_buckets(dates, start)
        .into_iter()
        .filter_map(|(week, members)| {
            members
                .last()
                .and_then(|&idx| values.get(idx))
                .map(|v| (week, v.clone()))
        })
        .unzip()
}
