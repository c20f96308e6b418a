//! Customer lifetime value projection
//!
//! The value of a customer over the next `months` months is the expected
//! number of purchases in each month, priced at the expected average
//! transaction value and discounted back to the cutoff date:
//!
//! ```text
//! cltv = Σ_{i=1..months} value · (N(i·f) - N((i-1)·f)) / (1 + d)^i
//! ```
//!
//! where `N(h)` is the frequency model's expected purchase count over horizon
//! `h`, `f` the number of time units per month and `d` the monthly discount
//! rate.

use serde::{Deserialize, Serialize};

use crate::{
    customer::TimeUnit,
    model::{FrequencyModel, MonetaryModel},
};

/// Projection window and discounting for [`customer_lifetime_value`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ValueHorizon {
    /// Number of months to project
    pub months: u32,
    /// Unit the frequency model was fitted in
    pub time_unit: TimeUnit,
    /// Monthly discount rate, `0.01` for 1%
    pub discount_rate: f64,
}

impl Default for ValueHorizon {
    fn default() -> Self {
        Self {
            months: 6,
            time_unit: TimeUnit::Week,
            discount_rate: 0.01,
        }
    }
}

/// Features of one customer entering [`customer_lifetime_value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueInputs {
    /// Frequency as fed to the frequency model
    pub frequency: f64,
    pub recency: f64,
    pub t: f64,
    /// Number of transactions `avg_monetary` is the mean of
    pub transactions: f64,
    pub avg_monetary: f64,
}

/// Discounted expected revenue of one customer over `horizon`.
///
/// `time_unit` in `horizon` must match the unit the frequency model was
/// fitted in. The result is zero for a zero-month horizon and decreases as
/// the discount rate grows.
///
/// # Examples
///
/// ```
/// use clvkit_models::{
///     bgnbd::{BetaGeoModel, BetaGeoParams},
///     cltv::{ValueHorizon, ValueInputs, customer_lifetime_value},
///     gamma_gamma::{GammaGammaModel, GammaGammaParams},
/// };
///
/// let frequency = BetaGeoModel::new(BetaGeoParams { r: 0.24, alpha: 4.41, a: 0.79, b: 2.43 });
/// let monetary = GammaGammaModel::new(GammaGammaParams { p: 6.25, q: 3.74, v: 15.44 });
/// let customer = ValueInputs {
///     frequency: 4.0,
///     recency: 30.0,
///     t: 38.0,
///     transactions: 4.0,
///     avg_monetary: 25.0,
/// };
/// let horizon = ValueHorizon::default();
///
/// let value = customer_lifetime_value(&frequency, &monetary, &customer, &horizon);
/// assert!(value > 0.0);
///
/// let none = ValueHorizon { months: 0, ..horizon };
/// assert_eq!(customer_lifetime_value(&frequency, &monetary, &customer, &none), 0.0);
/// ```
#[must_use]
pub fn customer_lifetime_value<F, M>(
    frequency_model: &F,
    monetary_model: &M,
    customer: &ValueInputs,
    horizon: &ValueHorizon,
) -> f64
where
    F: FrequencyModel + ?Sized,
    M: MonetaryModel + ?Sized,
{
    let ValueInputs {
        frequency,
        recency,
        t,
        transactions,
        avg_monetary,
    } = *customer;
    let value = monetary_model.conditional_expected_average_profit(transactions, avg_monetary);
    let per_month = horizon.time_unit.per_month();

    let mut total = 0.0;
    let mut previous = 0.0;
    for month in 1..=horizon.months {
        let cumulative =
            frequency_model.predict(f64::from(month) * per_month, frequency, recency, t);
        let expected = (cumulative - previous).max(0.0);
        previous = cumulative;
        total += value * expected / (1.0 + horizon.discount_rate).powf(f64::from(month));
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Purchases at a constant rate per time unit.
    struct ConstantRate(f64);

    impl FrequencyModel for ConstantRate {
        fn predict(&self, horizon: f64, _frequency: f64, _recency: f64, _t: f64) -> f64 {
            self.0 * horizon
        }
    }

    struct FixedValue(f64);

    impl MonetaryModel for FixedValue {
        fn conditional_expected_average_profit(&self, _frequency: f64, _avg: f64) -> f64 {
            self.0
        }
    }

    /// Returns the transaction count it is asked about.
    struct EchoCount;

    impl MonetaryModel for EchoCount {
        fn conditional_expected_average_profit(&self, frequency: f64, _avg: f64) -> f64 {
            frequency
        }
    }

    fn customer(avg_monetary: f64) -> ValueInputs {
        ValueInputs {
            frequency: 2.0,
            recency: 1.0,
            t: 2.0,
            transactions: 2.0,
            avg_monetary,
        }
    }

    fn monthly(months: u32, discount_rate: f64) -> ValueHorizon {
        ValueHorizon {
            months,
            time_unit: TimeUnit::Month,
            discount_rate,
        }
    }

    #[test]
    fn test_undiscounted_value_is_rate_times_value() {
        let value = customer_lifetime_value(
            &ConstantRate(2.0),
            &FixedValue(10.0),
            &customer(10.0),
            &monthly(3, 0.0),
        );
        assert!((value - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_discounting() {
        let value = customer_lifetime_value(
            &ConstantRate(1.0),
            &FixedValue(11.0),
            &customer(11.0),
            &monthly(2, 0.1),
        );
        let expected = 11.0 / 1.1 + 11.0 / 1.21;
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_weekly_unit_uses_weeks_per_month() {
        let horizon = ValueHorizon {
            months: 1,
            time_unit: TimeUnit::Week,
            discount_rate: 0.0,
        };
        let value =
            customer_lifetime_value(&ConstantRate(1.0), &FixedValue(1.0), &customer(1.0), &horizon);
        assert!((value - 4.345).abs() < 1e-12);
    }

    #[test]
    fn test_monetary_model_sees_transaction_count() {
        let inputs = ValueInputs {
            frequency: 2.0,
            transactions: 3.0,
            ..customer(5.0)
        };
        let value =
            customer_lifetime_value(&ConstantRate(1.0), &EchoCount, &inputs, &monthly(1, 0.0));
        assert!((value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_strictly_decreasing_in_discount_rate() {
        let mut previous = f64::INFINITY;
        for discount_rate in [0.0, 0.01, 0.05, 0.2, 1.0] {
            let horizon = ValueHorizon {
                months: 12,
                time_unit: TimeUnit::Day,
                discount_rate,
            };
            let value = customer_lifetime_value(
                &ConstantRate(0.1),
                &FixedValue(20.0),
                &customer(20.0),
                &horizon,
            );
            assert!(value < previous);
            previous = value;
        }
    }
}
