//! Descriptive statistics, empirical quantiles and stationarity diagnostics

use crate::{MathError, Result};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Statistics::mean(values))
    }
}

/// Sample variance (n - 1 denominator), `None` below two observations
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        None
    } else {
        Some(Statistics::variance(values))
    }
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Empirical quantile of `values` at probability `tau` (statrs order statistics)
pub fn quantile(values: &[f64], tau: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a quantile of an empty sample".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&tau) {
        return Err(MathError::InvalidInput(format!(
            "Quantile probability must lie in [0, 1], got {}",
            tau
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Quantile sample contains non-finite values".to_string(),
        ));
    }
    let mut data = Data::new(values.to_vec());
    Ok(data.quantile(tau))
}

/// Clip every value into the `[lower, upper]` empirical quantile range of the sample
pub fn clip_to_quantiles(values: &[f64], lower: f64, upper: f64) -> Result<Vec<f64>> {
    if lower >= upper {
        return Err(MathError::InvalidInput(format!(
            "Lower clip quantile {} must be below upper {}",
            lower, upper
        )));
    }
    let lo = quantile(values, lower)?;
    let hi = quantile(values, upper)?;
    Ok(values.iter().map(|v| v.clamp(lo, hi)).collect())
}

/// KPSS statistic for level stationarity with a Bartlett-weighted long-run variance.
///
/// Uses the short lag truncation `trunc(4 * (n / 100)^0.25)`. Returns `0.0` for a
/// series without variation, which always reads as stationary.
pub fn kpss_level_statistic(values: &[f64]) -> Result<f64> {
    let n = values.len();
    if n < 3 {
        return Err(MathError::InsufficientData(format!(
            "KPSS needs at least 3 observations, have {}",
            n
        )));
    }
    let m = Statistics::mean(values);
    let resid: Vec<f64> = values.iter().map(|v| v - m).collect();
    let nf = n as f64;

    let lags = (4.0 * (nf / 100.0).powf(0.25)).trunc() as usize;
    let mut long_run = resid.iter().map(|e| e * e).sum::<f64>() / nf;
    for s in 1..=lags.min(n - 1) {
        let weight = 1.0 - s as f64 / (lags as f64 + 1.0);
        let cov: f64 = resid[s..]
            .iter()
            .zip(&resid[..n - s])
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * cov / nf;
    }
    if long_run <= f64::EPSILON {
        return Ok(0.0);
    }

    let mut partial = 0.0;
    let mut sum_sq = 0.0;
    for e in &resid {
        partial += e;
        sum_sq += partial * partial;
    }
    Ok(sum_sq / (nf * nf * long_run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(variance(&values).unwrap(), 32.0 / 7.0, epsilon = 1e-12);
        assert!(mean(&[]).is_none());
        assert!(variance(&[1.0]).is_none());
    }

    #[test]
    fn test_quantile_extremes_and_validation() {
        let values = [3.0, 1.0, 2.0, 5.0, 4.0];
        assert_relative_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&values, 1.0).unwrap(), 5.0);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 3.0);

        assert!(quantile(&[], 0.5).is_err());
        assert!(quantile(&values, 1.5).is_err());
        assert!(quantile(&[1.0, f64::NAN], 0.5).is_err());
    }

    #[test]
    fn test_clipping_bounds_outliers() {
        let mut values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        values.push(10_000.0);
        let clipped = clip_to_quantiles(&values, 0.05, 0.95).unwrap();

        let max = clipped.iter().cloned().fold(f64::MIN, f64::max);
        assert!(max < 100.0);
        assert_eq!(clipped.len(), values.len());
        assert!(clip_to_quantiles(&values, 0.9, 0.1).is_err());
    }

    #[test]
    fn test_kpss_separates_trend_from_noise() {
        let noise: Vec<f64> = (0..200).map(|i| ((i * 7919) % 17) as f64 - 8.0).collect();
        let trend: Vec<f64> = (0..200).map(|i| i as f64).collect();

        assert!(kpss_level_statistic(&noise).unwrap() < 0.463);
        assert!(kpss_level_statistic(&trend).unwrap() > 0.463);
        assert_eq!(kpss_level_statistic(&[1.0; 10]).unwrap(), 0.0);
    }
}
