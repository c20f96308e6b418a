//! Derivative-free minimization with the Nelder-Mead simplex method
//!
//! The likelihoods of the customer models are smooth but their gradients are
//! tedious to derive (they involve digamma terms), and the parameter vectors
//! have at most four entries. A simplex search over unconstrained
//! (log-transformed) parameters is robust for problems of that size.
//!
//! # Algorithm
//!
//! Each iteration orders the `n + 1` simplex vertices by objective value and
//! replaces the worst vertex by reflecting it through the centroid of the
//! others, expanding or contracting the step depending on the outcome. When no
//! contraction improves on the worst vertex, the whole simplex shrinks toward
//! the best one. The search stops when both the spread of objective values and
//! the spread of vertex coordinates fall below the tolerances.
//!
//! Non-finite objective values are treated as `+inf`, which pushes the simplex
//! back into the region where the objective is defined.
//!
//! # Examples
//!
//! ```
//! use clvkit_stats::optimize::NelderMead;
//!
//! let rosenbrock = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
//! let minimum = NelderMead::default()
//!     .minimize_with_restart(rosenbrock, &[-1.2, 1.0])
//!     .unwrap();
//! assert!((minimum.point[0] - 1.0).abs() < 1e-4);
//! assert!((minimum.point[1] - 1.0).abs() < 1e-4);
//! ```

/// Errors reported by the minimizer.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum OptimizeError {
    #[display("objective is not finite at the starting point")]
    NonFiniteStart,
    #[display("starting point has no coordinates")]
    EmptyStart,
    #[display("simplex did not converge within {iterations} iterations")]
    MaxIterations { iterations: usize },
}

/// Nelder-Mead settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Iteration budget
    pub max_iterations: usize,
    /// Convergence tolerance on vertex coordinates
    pub x_tolerance: f64,
    /// Convergence tolerance on objective values
    pub f_tolerance: f64,
    /// Offset of the initial simplex vertices from the starting point
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            x_tolerance: 1e-8,
            f_tolerance: 1e-12,
            initial_step: 0.5,
        }
    }
}

/// Result of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimizes `objective` starting from `start`.
    pub fn minimize<F>(&self, mut objective: F, start: &[f64]) -> Result<Minimum, OptimizeError>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = start.len();
        if n == 0 {
            return Err(OptimizeError::EmptyStart);
        }
        let mut eval = |x: &[f64]| {
            let value = objective(x);
            if value.is_finite() {
                value
            } else {
                f64::INFINITY
            }
        };

        let start_value = eval(start);
        if !start_value.is_finite() {
            return Err(OptimizeError::NonFiniteStart);
        }

        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push((start.to_vec(), start_value));
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        for iteration in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            if self.has_converged(&simplex) {
                let (point, value) = simplex.swap_remove(0);
                return Ok(Minimum {
                    point,
                    value,
                    iterations: iteration,
                });
            }

            let centroid = centroid(&simplex[..n]);
            let (worst, worst_value) = simplex[n].clone();
            let best_value = simplex[0].1;
            let second_worst_value = simplex[n - 1].1;

            let reflected = along(&centroid, &worst, -REFLECTION);
            let reflected_value = eval(&reflected);

            if reflected_value < best_value {
                let expanded = along(&centroid, &worst, -EXPANSION);
                let expanded_value = eval(&expanded);
                simplex[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }
            if reflected_value < second_worst_value {
                simplex[n] = (reflected, reflected_value);
                continue;
            }

            let (contracted, contracted_value, accept) = if reflected_value < worst_value {
                let outside = along(&centroid, &worst, -REFLECTION * CONTRACTION);
                let value = eval(&outside);
                (outside, value, value <= reflected_value)
            } else {
                let inside = along(&centroid, &worst, CONTRACTION);
                let value = eval(&inside);
                (inside, value, value < worst_value)
            };
            if accept {
                simplex[n] = (contracted, contracted_value);
                continue;
            }

            let best = simplex[0].0.clone();
            for (vertex, value) in &mut simplex[1..] {
                for (x, b) in vertex.iter_mut().zip(&best) {
                    *x = b + SHRINK * (*x - b);
                }
                *value = eval(vertex);
            }
        }

        Err(OptimizeError::MaxIterations {
            iterations: self.max_iterations,
        })
    }

    /// Runs [`minimize`](Self::minimize) and restarts once from the result.
    ///
    /// A collapsed simplex can stall on a slope; rebuilding it around the
    /// reported minimum either confirms the point or moves past it.
    pub fn minimize_with_restart<F>(
        &self,
        mut objective: F,
        start: &[f64],
    ) -> Result<Minimum, OptimizeError>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let first = self.minimize(&mut objective, start)?;
        let step = Self {
            initial_step: self.initial_step * 0.1,
            ..*self
        };
        let second = step.minimize(&mut objective, &first.point)?;
        Ok(Minimum {
            iterations: first.iterations + second.iterations,
            ..second
        })
    }

    fn has_converged(&self, sorted: &[(Vec<f64>, f64)]) -> bool {
        let (best, best_value) = &sorted[0];
        let f_spread = sorted[1..]
            .iter()
            .map(|(_, v)| (v - best_value).abs())
            .fold(0.0, f64::max);
        let x_spread = sorted[1..]
            .iter()
            .flat_map(|(x, _)| x.iter().zip(best).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        f_spread <= self.f_tolerance && x_spread <= self.x_tolerance
    }
}

#[expect(clippy::cast_precision_loss)]
fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let n = vertices.len() as f64;
    let dim = vertices[0].0.len();
    (0..dim)
        .map(|i| vertices.iter().map(|(x, _)| x[i]).sum::<f64>() / n)
        .collect()
}

/// `centroid + coefficient * (worst - centroid)`
fn along(centroid: &[f64], worst: &[f64], coefficient: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(worst)
        .map(|(c, w)| c + coefficient * (w - c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let objective = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2) + 5.0;
        let minimum = NelderMead::default().minimize(objective, &[0.0, 0.0]).unwrap();
        assert!((minimum.point[0] - 3.0).abs() < 1e-6);
        assert!((minimum.point[1] + 1.0).abs() < 1e-6);
        assert!((minimum.value - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_four_dimensions() {
        let target = [0.5, -2.0, 1.5, 0.0];
        let weights = [1.0, 2.0, 3.0, 4.0];
        let objective = |x: &[f64]| {
            x.iter()
                .zip(&target)
                .zip(&weights)
                .map(|((a, b), w)| w * (a - b).powi(2))
                .sum::<f64>()
        };
        let minimum = NelderMead::default()
            .minimize_with_restart(objective, &[0.0; 4])
            .unwrap();
        for (x, t) in minimum.point.iter().zip(&target) {
            assert!((x - t).abs() < 1e-5);
        }
    }

    #[test]
    fn test_non_finite_region_is_avoided() {
        // undefined for x <= 0
        let objective = |x: &[f64]| if x[0] <= 0.0 { f64::NAN } else { x[0] - x[0].ln() };
        let minimum = NelderMead::default().minimize(objective, &[2.0]).unwrap();
        assert!((minimum.point[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_start() {
        let result = NelderMead::default().minimize(|_| f64::NAN, &[1.0]);
        assert_eq!(result, Err(OptimizeError::NonFiniteStart));
    }

    #[test]
    fn test_empty_start() {
        let result = NelderMead::default().minimize(|_| 0.0, &[]);
        assert_eq!(result, Err(OptimizeError::EmptyStart));
    }

    #[test]
    fn test_iteration_budget() {
        let settings = NelderMead {
            max_iterations: 3,
            ..NelderMead::default()
        };
        let result = settings.minimize(|x| x[0].powi(2) + x[1].powi(2), &[10.0, -7.0]);
        assert_eq!(result, Err(OptimizeError::MaxIterations { iterations: 3 }));
    }
}
