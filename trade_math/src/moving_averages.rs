//! Simple moving average, streaming and over a whole series

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) over a fixed window
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        })
    }

    /// Push a value and return the average once the window is full
    pub fn next(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        self.sum += value;

        if self.window.len() > self.period {
            if let Some(oldest) = self.window.pop_front() {
                self.sum -= oldest;
            }
        }

        self.value()
    }

    /// Current average, `None` while the window is still filling
    pub fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            None
        } else {
            Some(self.sum / self.period as f64)
        }
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }
}

/// Rolling mean aligned with the input; the first `period - 1` entries are `None`
pub fn rolling_mean(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(period)?;
    Ok(values.iter().map(|&v| sma.next(v)).collect())
}
