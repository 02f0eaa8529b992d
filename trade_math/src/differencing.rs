//! First differencing and its inverse

use crate::{MathError, Result};

/// First differences `x[t] - x[t-1]`; the output is one element shorter than the input
pub fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Apply first differencing `order` times
pub fn difference_n(values: &[f64], order: usize) -> Result<Vec<f64>> {
    if values.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "Cannot difference {} values {} times",
            values.len(),
            order
        )));
    }
    let mut out = values.to_vec();
    for _ in 0..order {
        out = difference(&out);
    }
    Ok(out)
}

/// Difference aligned with the input, the first entry being `None`
pub fn difference_aligned(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.push(None);
    for w in values.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        });
    }
    out.truncate(values.len());
    out
}

/// Cumulative sum of `diffs` starting from `anchor`
pub fn integrate(anchor: f64, diffs: &[f64]) -> Vec<f64> {
    diffs
        .iter()
        .scan(anchor, |level, d| {
            *level += d;
            Some(*level)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_and_integrate_round_trip() {
        let levels = [100.0, 101.5, 101.0, 103.0];
        let diffs = difference(&levels);

        assert_eq!(diffs, vec![1.5, -0.5, 2.0]);
        assert_eq!(integrate(levels[0], &diffs), levels[1..].to_vec());
    }

    #[test]
    fn test_second_order_difference() {
        let squares = [0.0, 1.0, 4.0, 9.0, 16.0];
        assert_eq!(difference_n(&squares, 2).unwrap(), vec![2.0, 2.0, 2.0]);
        assert!(difference_n(&[1.0], 1).is_err());
    }

    #[test]
    fn test_aligned_difference_keeps_gaps() {
        let values = [Some(1.0), None, Some(4.0), Some(6.0)];
        assert_eq!(
            difference_aligned(&values),
            vec![None, None, None, Some(2.0)]
        );
        assert!(difference_aligned(&[]).is_empty());
    }
}
