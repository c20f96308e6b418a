//! Model traits shared by the purchase-frequency and monetary-value models
//!
//! Each model is split into an *estimator* that holds fitting settings and a
//! fitted *model* that holds the learned hyperparameters. A fitted model is an
//! immutable value: prediction takes `&self` and never refits, so one fit can
//! serve any number of prediction calls.
//!
//! ```text
//! FrequencyEstimator::fit(frequency, recency, T) -> FrequencyModel
//!     FrequencyModel::predict(horizon, frequency, recency, T)
//!
//! MonetaryEstimator::fit(frequency, avg_monetary) -> MonetaryModel
//!     MonetaryModel::conditional_expected_average_profit(frequency, avg_monetary)
//! ```

use clvkit_stats::optimize::OptimizeError;

/// Failure to fit a model to the given population.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("no customers to fit")]
    Empty,
    #[display("input columns have different lengths ({expected} and {actual})")]
    Misaligned { expected: usize, actual: usize },
    #[display("{column}[{index}] must be a finite non-negative number, got {value}")]
    InvalidValue {
        column: &'static str,
        index: usize,
        value: f64,
    },
    #[display("{column}[{index}] must be positive, got {value}")]
    NonPositive {
        column: &'static str,
        index: usize,
        value: f64,
    },
    #[display("frequency[{index}] must be at least 1, got {value}")]
    FrequencyBelowOne { index: usize, value: f64 },
    #[display("recency[{index}] = {recency} exceeds T = {t}")]
    RecencyExceedsT { index: usize, recency: f64, t: f64 },
    #[display("T has zero variance")]
    ZeroVarianceT,
    #[display("frequency is zero for every customer")]
    AllZeroFrequency,
    #[display("optimizer failed: {_0}")]
    Convergence(OptimizeError),
    #[display("fitted parameters are not finite and positive: {params:?}")]
    NonFiniteParameters { params: Vec<f64> },
}

/// A fitted purchase-frequency model.
pub trait FrequencyModel {
    /// Conditional expected number of transactions in `(T, T + horizon]` for
    /// a customer with the given history.
    ///
    /// The result is non-negative, finite and non-decreasing in `horizon`.
    fn predict(&self, horizon: f64, frequency: f64, recency: f64, t: f64) -> f64;
}

/// Fits a [`FrequencyModel`] to a population.
pub trait FrequencyEstimator {
    type Model: FrequencyModel;

    /// Fits the model to aligned per-customer columns.
    ///
    /// # Errors
    ///
    /// Returns [`FitError`] for empty, misaligned or degenerate input and when
    /// the optimizer does not reach finite parameters.
    fn fit(&self, frequency: &[f64], recency: &[f64], t: &[f64]) -> Result<Self::Model, FitError>;
}

/// A fitted monetary-value model.
pub trait MonetaryModel {
    /// Expected average transaction value, shrunk toward the population mean
    /// in proportion to how little purchase history the customer has.
    ///
    /// `frequency` is the number of transactions `avg_monetary` is the mean
    /// of.
    fn conditional_expected_average_profit(&self, frequency: f64, avg_monetary: f64) -> f64;
}

/// Fits a [`MonetaryModel`] to a population.
pub trait MonetaryEstimator {
    type Model: MonetaryModel;

    /// Fits the model to aligned per-customer columns, where `frequency[i]`
    /// counts the transactions averaged in `avg_monetary[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`FitError`] for empty, misaligned or non-positive input and
    /// when the optimizer does not reach finite parameters.
    fn fit(&self, frequency: &[f64], avg_monetary: &[f64]) -> Result<Self::Model, FitError>;
}

pub(crate) fn check_aligned(expected: usize, columns: &[&[f64]]) -> Result<(), FitError> {
    if expected == 0 {
        return Err(FitError::Empty);
    }
    for column in columns {
        if column.len() != expected {
            return Err(FitError::Misaligned {
                expected,
                actual: column.len(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_non_negative(column: &'static str, values: &[f64]) -> Result<(), FitError> {
    match values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        Some((index, &value)) => Err(FitError::InvalidValue {
            column,
            index,
            value,
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_positive(column: &'static str, values: &[f64]) -> Result<(), FitError> {
    check_non_negative(column, values)?;
    match values.iter().enumerate().find(|(_, v)| **v <= 0.0) {
        Some((index, &value)) => Err(FitError::NonPositive {
            column,
            index,
            value,
        }),
        None => Ok(()),
    }
}

/// Converts optimizer output back from log space and checks it.
pub(crate) fn positive_params(point: &[f64]) -> Result<Vec<f64>, FitError> {
    let params = point.iter().map(|x| x.exp()).collect::<Vec<_>>();
    if params.iter().all(|p| p.is_finite() && *p > 0.0) {
        Ok(params)
    } else {
        Err(FitError::NonFiniteParameters { params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_aligned() {
        assert_eq!(check_aligned(0, &[]), Err(FitError::Empty));
        assert_eq!(
            check_aligned(2, &[&[1.0, 2.0][..], &[1.0][..]]),
            Err(FitError::Misaligned {
                expected: 2,
                actual: 1
            })
        );
        assert!(check_aligned(1, &[&[1.0][..], &[2.0][..]]).is_ok());
    }

    #[test]
    fn test_value_checks() {
        assert!(matches!(
            check_non_negative("recency", &[1.0, -0.5]),
            Err(FitError::InvalidValue { index: 1, .. })
        ));
        assert!(matches!(
            check_non_negative("T", &[f64::NAN]),
            Err(FitError::InvalidValue { index: 0, .. })
        ));
        assert!(matches!(
            check_positive("avg_monetary", &[3.0, 0.0]),
            Err(FitError::NonPositive { index: 1, .. })
        ));
    }

    #[test]
    fn test_positive_params() {
        let params = positive_params(&[0.0, 1.0_f64.ln()]).unwrap();
        assert!((params[0] - 1.0).abs() < 1e-12);
        assert!(matches!(
            positive_params(&[1000.0]),
            Err(FitError::NonFiniteParameters { .. })
        ));
    }
}
