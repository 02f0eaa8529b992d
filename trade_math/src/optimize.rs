//! Bounded Nelder-Mead minimisation
//!
//! Every likelihood or sum-of-squares fit in the workspace goes through this
//! minimiser. A fit either converges within `max_iterations` or reports
//! [`MathError::NonConvergence`]; callers decide what an unconverged fit means.

use crate::{MathError, Result};
use std::cmp::Ordering;

/// Result of a successful minimisation
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Location of the best vertex
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
}

/// Downhill simplex minimiser with an iteration bound
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iterations: usize,
    tolerance: f64,
    initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

impl NelderMead {
    /// Create a minimiser; `tolerance` is relative to the best objective value
    pub fn new(max_iterations: usize, tolerance: f64) -> Result<Self> {
        if max_iterations == 0 {
            return Err(MathError::InvalidInput(
                "max_iterations must be greater than zero".to_string(),
            ));
        }
        if tolerance <= 0.0 || !tolerance.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "tolerance must be positive, got {}",
                tolerance
            )));
        }
        Ok(Self {
            max_iterations,
            tolerance,
            initial_step: 0.1,
        })
    }

    /// Size of the initial simplex displacement along each axis
    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Minimise `objective` starting from `start`.
    ///
    /// Non-finite objective values are treated as `+inf`, which lets callers
    /// reject infeasible parameter vectors by returning `f64::INFINITY`.
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = start.len();
        if n == 0 {
            return Err(MathError::InvalidInput(
                "Cannot minimise over zero parameters".to_string(),
            ));
        }
        let eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.to_vec(), eval(start)));
        for i in 0..n {
            let mut vertex = start.to_vec();
            let step = if vertex[i].abs() > 1e-8 {
                self.initial_step * vertex[i].abs()
            } else {
                self.initial_step
            };
            vertex[i] += step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }
        if simplex.iter().all(|(_, v)| v.is_infinite()) {
            return Err(MathError::CalculationError(
                "Objective is not finite anywhere on the initial simplex".to_string(),
            ));
        }

        for iteration in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            let best = simplex[0].1;
            let worst = simplex[n].1;
            if best.is_finite() && (worst - best).abs() <= self.tolerance * (1.0 + best.abs()) {
                return Ok(Minimum {
                    point: simplex[0].0.clone(),
                    value: best,
                    iterations: iteration,
                });
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
                .collect();
            let along = |coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n].0)
                    .map(|(c, w)| c + coef * (w - c))
                    .collect()
            };

            let reflected = along(-1.0);
            let reflected_value = eval(&reflected);
            if reflected_value < simplex[0].1 {
                let expanded = along(-2.0);
                let expanded_value = eval(&expanded);
                simplex[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }
            if reflected_value < simplex[n - 1].1 {
                simplex[n] = (reflected, reflected_value);
                continue;
            }

            let contracted = if reflected_value < simplex[n].1 {
                along(-0.5)
            } else {
                along(0.5)
            };
            let contracted_value = eval(&contracted);
            if contracted_value < simplex[n].1.min(reflected_value) {
                simplex[n] = (contracted, contracted_value);
                continue;
            }

            // shrink towards the best vertex
            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(&vertex.0)
                    .map(|(a, x)| a + 0.5 * (x - a))
                    .collect();
                let value = eval(&shrunk);
                *vertex = (shrunk, value);
            }
        }

        Err(MathError::NonConvergence {
            iterations: self.max_iterations,
        })
    }
}
