//! BG/NBD purchase-frequency model
//!
//! The beta-geometric / negative-binomial distribution model describes a
//! customer as alternating between two processes:
//!
//! - While active, transactions follow a Poisson process with rate `λ`, and
//!   `λ` varies across customers as `Gamma(r, α)`.
//! - After each transaction the customer becomes inactive with probability
//!   `p`, and `p` varies across customers as `Beta(a, b)`.
//!
//! Only the four population hyperparameters `(r, α, a, b)` are learned. The
//! per-customer summary `(frequency, recency, T)` is sufficient for both the
//! likelihood and the predictions.
//!
//! # Fitting
//!
//! Parameters are fitted by minimizing
//!
//! ```text
//! -mean(log_likelihood) + penalizer * (r² + α² + a² + b²)
//! ```
//!
//! over log-transformed parameters. Time columns are rescaled so that the
//! largest `T` equals 10 during the search; `α` is mapped back afterwards.
//!
//! # Example
//!
//! ```
//! use clvkit_models::{
//!     bgnbd::{BetaGeoModel, BetaGeoParams},
//!     model::FrequencyModel,
//! };
//!
//! let model = BetaGeoModel::new(BetaGeoParams { r: 0.24, alpha: 4.41, a: 0.79, b: 2.43 });
//! let short = model.predict(4.0, 3.0, 20.0, 30.0);
//! let long = model.predict(12.0, 3.0, 20.0, 30.0);
//! assert!(0.0 < short && short < long);
//! ```

use clvkit_stats::{
    descriptive::DescriptiveStats,
    optimize::NelderMead,
    special::{hyp2f1, ln_gamma, log_add_exp},
};
use serde::{Deserialize, Serialize};

use crate::model::{
    FitError, FrequencyEstimator, FrequencyModel, check_aligned, check_non_negative,
    positive_params,
};

/// Largest `T` after rescaling for the search
const SCALED_MAX_T: f64 = 10.0;

/// Hyperparameters of a fitted BG/NBD model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BetaGeoParams {
    /// Shape of the transaction-rate distribution
    pub r: f64,
    /// Scale of the transaction-rate distribution, in time units
    pub alpha: f64,
    /// Dropout-probability Beta parameter `a`
    pub a: f64,
    /// Dropout-probability Beta parameter `b`
    pub b: f64,
}

impl BetaGeoParams {
    /// Log-likelihood of one customer's history.
    ///
    /// `frequency` is the number of transactions, `recency` the time of the
    /// last one and `t` the length of the observation period, all relative to
    /// the first transaction.
    #[must_use]
    pub fn log_likelihood(&self, frequency: f64, recency: f64, t: f64) -> f64 {
        let Self { r, alpha, a, b } = *self;
        let x = frequency;
        let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
        let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
        let a3 = -(r + x) * (alpha + t).ln();
        if x > 0.0 {
            let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + recency).ln();
            a1 + a2 + log_add_exp(a3, a4)
        } else {
            a1 + a2 + a3
        }
    }

    fn to_vec(self) -> Vec<f64> {
        vec![self.r, self.alpha, self.a, self.b]
    }
}

/// Fits [`BetaGeoModel`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaGeoFitter {
    /// L2 penalty coefficient on the (time-rescaled) parameters
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

impl Default for BetaGeoFitter {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl BetaGeoFitter {
    #[must_use]
    pub fn new(penalizer: f64) -> Self {
        Self {
            penalizer,
            optimizer: NelderMead::default(),
        }
    }
}

impl FrequencyEstimator for BetaGeoFitter {
    type Model = BetaGeoModel;

    fn fit(&self, frequency: &[f64], recency: &[f64], t: &[f64]) -> Result<BetaGeoModel, FitError> {
        check_aligned(frequency.len(), &[recency, t])?;
        check_non_negative("frequency", frequency)?;
        check_non_negative("recency", recency)?;
        check_non_negative("T", t)?;
        if let Some((index, (&recency, &t))) = recency
            .iter()
            .zip(t)
            .enumerate()
            .find(|(_, (recency, t))| recency > t)
        {
            return Err(FitError::RecencyExceedsT { index, recency, t });
        }
        let t_stats = DescriptiveStats::new(t.iter().copied()).ok_or(FitError::Empty)?;
        if t_stats.variance <= 0.0 {
            return Err(FitError::ZeroVarianceT);
        }
        if frequency.iter().all(|x| *x == 0.0) {
            return Err(FitError::AllZeroFrequency);
        }

        let scale = SCALED_MAX_T / t_stats.max;
        let scaled_recency = recency.iter().map(|v| v * scale).collect::<Vec<_>>();
        let scaled_t = t.iter().map(|v| v * scale).collect::<Vec<_>>();
        #[expect(clippy::cast_precision_loss)]
        let n = frequency.len() as f64;

        let objective = |log_params: &[f64]| {
            let params = BetaGeoParams {
                r: log_params[0].exp(),
                alpha: log_params[1].exp(),
                a: log_params[2].exp(),
                b: log_params[3].exp(),
            };
            let total = frequency
                .iter()
                .zip(&scaled_recency)
                .zip(&scaled_t)
                .map(|((&x, &t_x), &t)| params.log_likelihood(x, t_x, t))
                .sum::<f64>();
            let penalty = params.to_vec().iter().map(|p| p * p).sum::<f64>();
            -total / n + self.penalizer * penalty
        };

        let minimum = self
            .optimizer
            .minimize_with_restart(objective, &[0.0; 4])
            .map_err(FitError::Convergence)?;
        let fitted = positive_params(&minimum.point)?;
        let params = BetaGeoParams {
            r: fitted[0],
            alpha: fitted[1] / scale,
            a: fitted[2],
            b: fitted[3],
        };
        if !params.alpha.is_finite() {
            return Err(FitError::NonFiniteParameters {
                params: params.to_vec(),
            });
        }

        tracing::info!(
            customers = frequency.len(),
            r = params.r,
            alpha = params.alpha,
            a = params.a,
            b = params.b,
            iterations = minimum.iterations,
            "fitted BG/NBD model"
        );
        Ok(BetaGeoModel { params })
    }
}

/// A fitted BG/NBD model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BetaGeoModel {
    params: BetaGeoParams,
}

impl BetaGeoModel {
    #[must_use]
    pub fn new(params: BetaGeoParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> BetaGeoParams {
        self.params
    }

    /// Probability that a customer with the given history is still active at
    /// the end of the observation period.
    #[must_use]
    pub fn probability_alive(&self, frequency: f64, recency: f64, t: f64) -> f64 {
        1.0 / (1.0 + self.dropout_odds(frequency, recency, t))
    }

    fn dropout_odds(&self, frequency: f64, recency: f64, t: f64) -> f64 {
        if frequency <= 0.0 {
            return 0.0;
        }
        let BetaGeoParams { r, alpha, a, b } = self.params;
        a / (b + frequency - 1.0) * ((alpha + t) / (alpha + recency)).powf(r + frequency)
    }
}

impl FrequencyModel for BetaGeoModel {
    fn predict(&self, horizon: f64, frequency: f64, recency: f64, t: f64) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let BetaGeoParams { r, alpha, b, .. } = self.params;
        // the closed form has a removable singularity at a = 1
        let a = if (self.params.a - 1.0).abs() < 1e-9 {
            1.0 + 1e-9
        } else {
            self.params.a
        };
        let x = frequency;

        let hyp_a = r + x;
        let hyp_b = b + x;
        let hyp_c = a + b + x - 1.0;
        let z = horizon / (alpha + t + horizon);
        let mut ln_hyp = hyp2f1(hyp_a, hyp_b, hyp_c, z).ln();
        if !ln_hyp.is_finite() {
            // Euler transformation
            ln_hyp = hyp2f1(hyp_c - hyp_a, hyp_c - hyp_b, hyp_c, z).ln()
                + (hyp_c - hyp_a - hyp_b) * (1.0 - z).ln();
        }

        let first = (a + b + x - 1.0) / (a - 1.0);
        let second = 1.0 - (ln_hyp + (r + x) * ((alpha + t) / (alpha + horizon + t)).ln()).exp();
        let expected = first * second / (1.0 + self.dropout_odds(x, recency, t));
        if expected.is_finite() {
            expected.max(0.0)
        } else {
            tracing::debug!(horizon, frequency, recency, t, "non-finite BG/NBD prediction");
            0.0
        }
    }
}
