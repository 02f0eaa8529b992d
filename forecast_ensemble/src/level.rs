//! Reconstruction of level forecasts from forecasted differences

use crate::models::{propagate_gaps, PointForecast};
use trade_math::differencing::integrate;

/// Cumulate forecasted first differences onto the last training level.
///
/// `level_i = anchor + d_1 + ... + d_i`. Errors in early steps carry into
/// every later level; an unavailable difference makes its own level and all
/// later levels unavailable.
pub fn recover_levels(anchor: f64, diffs: &[PointForecast]) -> Vec<PointForecast> {
    let available: Vec<f64> = diffs
        .iter()
        .map_while(|d| d.as_ref().ok().copied())
        .collect();
    let cumulated = integrate(anchor, &available)
        .into_iter()
        .map(Ok)
        .chain(diffs[available.len()..].iter().cloned())
        .collect();
    propagate_gaps(cumulated)
}
