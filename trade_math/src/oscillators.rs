//! Relative Strength Index with Wilder smoothing

use crate::{MathError, Result};

/// Streaming Relative Strength Index (RSI)
#[derive(Debug, Clone)]
pub struct RelativeStrengthIndex {
    period: usize,
    previous_price: Option<f64>,
    seed_gain: f64,
    seed_loss: f64,
    changes_seen: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

impl RelativeStrengthIndex {
    /// Create a new RSI with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            previous_price: None,
            seed_gain: 0.0,
            seed_loss: 0.0,
            changes_seen: 0,
            avg_gain: None,
            avg_loss: None,
        })
    }

    /// Push a price and return the RSI (0-100) once `period` changes have been seen
    pub fn next(&mut self, price: f64) -> Option<f64> {
        let previous = self.previous_price.replace(price)?;
        let change = price - previous;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.changes_seen += 1;

        let n = self.period as f64;
        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                self.avg_gain = Some((avg_gain * (n - 1.0) + gain) / n);
                self.avg_loss = Some((avg_loss * (n - 1.0) + loss) / n);
            }
            _ => {
                self.seed_gain += gain;
                self.seed_loss += loss;
                if self.changes_seen == self.period {
                    self.avg_gain = Some(self.seed_gain / n);
                    self.avg_loss = Some(self.seed_loss / n);
                }
            }
        }

        self.value()
    }

    /// Current RSI value, `None` during warm-up
    pub fn value(&self) -> Option<f64> {
        let (avg_gain, avg_loss) = (self.avg_gain?, self.avg_loss?);
        if avg_loss == 0.0 {
            // flat series reads as neutral, a pure up-move as 100
            return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

/// RSI over a whole price series, aligned with the input
pub fn rsi_series(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut rsi = RelativeStrengthIndex::new(period)?;
    Ok(prices.iter().map(|&p| rsi.next(p)).collect())
}
