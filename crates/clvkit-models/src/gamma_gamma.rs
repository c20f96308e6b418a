//! Gamma-Gamma monetary-value model
//!
//! Individual transaction values of a customer are `Gamma(p, ν)` distributed,
//! and the customer-level rate `ν` varies across the population as
//! `Gamma(q, v)`. Given a customer's number of transactions `x` and average
//! transaction value `m`, the posterior mean of their average value is a
//! weighted blend of the population mean and `m`:
//!
//! ```text
//! w          = p·x / (p·x + q - 1)
//! population = v·p / (q - 1)
//! E[value]   = (1 - w)·population + w·m
//! ```
//!
//! Customers with more transactions get more weight on their own average.
//! The posterior mean only exists for `q > 1`, which the fit enforces by
//! searching over `q = 1 + exp(θ)`.
//!
//! # Example
//!
//! ```
//! use clvkit_models::{
//!     gamma_gamma::{GammaGammaModel, GammaGammaParams},
//!     model::MonetaryModel,
//! };
//!
//! let model = GammaGammaModel::new(GammaGammaParams { p: 6.25, q: 3.74, v: 15.45 });
//! let population_mean = 6.25 * 15.45 / (3.74 - 1.0);
//!
//! // a big spender with little history is pulled toward the population mean
//! let shrunk = model.conditional_expected_average_profit(2.0, 200.0);
//! assert!(population_mean < shrunk && shrunk < 200.0);
//! ```

use clvkit_stats::{optimize::NelderMead, special::ln_gamma};
use serde::{Deserialize, Serialize};

use crate::model::{
    FitError, MonetaryEstimator, MonetaryModel, check_aligned, check_positive, positive_params,
};

/// Hyperparameters of a fitted Gamma-Gamma model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GammaGammaParams {
    /// Shape of the per-transaction value distribution
    pub p: f64,
    /// Shape of the customer-rate distribution, always above 1
    pub q: f64,
    /// Rate of the customer-rate distribution, in currency units
    pub v: f64,
}

impl GammaGammaParams {
    /// Log-likelihood of one customer's average transaction value.
    #[must_use]
    pub fn log_likelihood(&self, frequency: f64, avg_monetary: f64) -> f64 {
        let Self { p, q, v } = *self;
        let x = frequency;
        let m = avg_monetary;
        let px = p * x;
        ln_gamma(px + q) - ln_gamma(q) + q * v.ln() + (px - 1.0) * m.ln() + px * x.ln()
            - ln_gamma(px)
            - (px + q) * (x * m + v).ln()
    }

    #[must_use]
    pub fn population_mean(&self) -> f64 {
        self.v * self.p / (self.q - 1.0)
    }
}

/// Fits [`GammaGammaModel`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaGammaFitter {
    /// L2 penalty coefficient on the (value-rescaled) parameters
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

impl Default for GammaGammaFitter {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl GammaGammaFitter {
    #[must_use]
    pub fn new(penalizer: f64) -> Self {
        Self {
            penalizer,
            optimizer: NelderMead::default(),
        }
    }
}

fn params_from_search(theta: &[f64]) -> GammaGammaParams {
    GammaGammaParams {
        p: theta[0].exp(),
        q: 1.0 + theta[1].exp(),
        v: theta[2].exp(),
    }
}

impl MonetaryEstimator for GammaGammaFitter {
    type Model = GammaGammaModel;

    fn fit(&self, frequency: &[f64], avg_monetary: &[f64]) -> Result<GammaGammaModel, FitError> {
        check_aligned(frequency.len(), &[avg_monetary])?;
        check_positive("frequency", frequency)?;
        if let Some((index, &value)) = frequency.iter().enumerate().find(|(_, x)| **x < 1.0) {
            return Err(FitError::FrequencyBelowOne { index, value });
        }
        check_positive("avg_monetary", avg_monetary)?;

        #[expect(clippy::cast_precision_loss)]
        let n = frequency.len() as f64;
        // search on values of order one; v scales with the currency unit
        let scale = avg_monetary.iter().sum::<f64>() / n;
        let scaled = avg_monetary.iter().map(|m| m / scale).collect::<Vec<_>>();

        let objective = |theta: &[f64]| {
            let params = params_from_search(theta);
            let total = frequency
                .iter()
                .zip(&scaled)
                .map(|(&x, &m)| params.log_likelihood(x, m))
                .sum::<f64>();
            let penalty = params.p.powi(2) + params.q.powi(2) + params.v.powi(2);
            -total / n + self.penalizer * penalty
        };

        let minimum = self
            .optimizer
            .minimize_with_restart(objective, &[0.0; 3])
            .map_err(FitError::Convergence)?;
        positive_params(&minimum.point)?;
        let fitted = params_from_search(&minimum.point);
        let params = GammaGammaParams {
            v: fitted.v * scale,
            ..fitted
        };
        if !(params.q > 1.0 && params.v.is_finite()) {
            return Err(FitError::NonFiniteParameters {
                params: vec![params.p, params.q, params.v],
            });
        }

        tracing::info!(
            customers = frequency.len(),
            p = params.p,
            q = params.q,
            v = params.v,
            iterations = minimum.iterations,
            "fitted Gamma-Gamma model"
        );
        Ok(GammaGammaModel { params })
    }
}

/// A fitted Gamma-Gamma model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GammaGammaModel {
    params: GammaGammaParams,
}

impl GammaGammaModel {
    #[must_use]
    pub fn new(params: GammaGammaParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> GammaGammaParams {
        self.params
    }
}

impl MonetaryModel for GammaGammaModel {
    fn conditional_expected_average_profit(&self, frequency: f64, avg_monetary: f64) -> f64 {
        let GammaGammaParams { p, q, .. } = self.params;
        let weight = p * frequency / (p * frequency + q - 1.0);
        (1.0 - weight) * self.params.population_mean() + weight * avg_monetary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDNOW: GammaGammaParams = GammaGammaParams {
        p: 6.25,
        q: 3.74,
        v: 15.44,
    };

    #[test]
    fn test_profit_between_population_mean_and_own_average() {
        let model = GammaGammaModel::new(CDNOW);
        let mean = CDNOW.population_mean();
        for (x, m) in [(1.0, 5.0), (2.0, 10.0), (10.0, 80.0), (30.0, 1.0)] {
            let value = model.conditional_expected_average_profit(x, m);
            assert!(value > 0.0);
            assert!(value >= mean.min(m) && value <= mean.max(m));
        }
    }

    #[test]
    fn test_more_history_means_less_shrinkage() {
        let model = GammaGammaModel::new(CDNOW);
        let few = model.conditional_expected_average_profit(2.0, 100.0);
        let many = model.conditional_expected_average_profit(20.0, 100.0);
        assert!(many > few);
        assert!(100.0 - many < 100.0 - few);
    }

    #[test]
    fn test_fit_rejects_invalid_input() {
        let fitter = GammaGammaFitter::default();
        assert_eq!(fitter.fit(&[], &[]), Err(FitError::Empty));
        assert!(matches!(
            fitter.fit(&[2.0, 3.0], &[10.0, 0.0]),
            Err(FitError::NonPositive {
                column: "avg_monetary",
                index: 1,
                ..
            })
        ));
        assert!(matches!(
            fitter.fit(&[2.0, 0.5], &[10.0, 5.0]),
            Err(FitError::FrequencyBelowOne { index: 1, .. })
        ));
        assert!(matches!(
            fitter.fit(&[2.0], &[10.0, 5.0]),
            Err(FitError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_fit_keeps_q_above_one() {
        let frequency = [2.0, 3.0, 2.0, 5.0, 4.0, 2.0, 6.0, 3.0, 2.0, 8.0];
        let avg = [20.0, 35.5, 12.0, 48.0, 25.0, 80.0, 30.0, 22.5, 15.0, 41.0];
        let model = GammaGammaFitter::default().fit(&frequency, &avg).unwrap();
        let params = model.params();
        assert!(params.q > 1.0);
        for (&x, &m) in frequency.iter().zip(&avg) {
            let value = model.conditional_expected_average_profit(x, m);
            assert!(value.is_finite() && value > 0.0);
        }
    }

    #[test]
    fn test_fit_scales_with_currency() {
        let frequency = [2.0, 3.0, 2.0, 5.0, 4.0, 2.0, 6.0, 3.0];
        let avg = [20.0, 35.5, 12.0, 48.0, 25.0, 80.0, 30.0, 22.5];
        let fitter = GammaGammaFitter::default();
        let units = fitter.fit(&frequency, &avg).unwrap();
        let cents = fitter.fit(&frequency, &avg.map(|m| m * 100.0)).unwrap();
        let in_units = units.conditional_expected_average_profit(3.0, 30.0);
        let in_cents = cents.conditional_expected_average_profit(3.0, 3000.0);
        assert!((in_units * 100.0 - in_cents).abs() < 1e-3 * in_cents);
    }
}
