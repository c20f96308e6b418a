//! Canonical per-customer record
//!
//! Whatever the input shape, feature derivation produces one
//! [`CustomerRecord`] per customer. Time-based features are expressed in a
//! single [`TimeUnit`] chosen for the whole run.
//!
//! ```text
//! first purchase        last purchase            cutoff
//!      |--------- recency ------|                   |
//!      |------------------------ T -----------------|
//! ```
//!
//! `recency <= T` holds for every record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unit in which recency, tenure and prediction horizons are expressed.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Day,
    #[default]
    Week,
    Month,
}

impl TimeUnit {
    /// Length of one unit in days.
    #[must_use]
    pub const fn days(self) -> f64 {
        match self {
            Self::Day => 1.0,
            Self::Week => 7.0,
            Self::Month => 30.0,
        }
    }

    /// Number of units in one month, used when projecting value month by month.
    #[must_use]
    pub const fn per_month(self) -> f64 {
        match self {
            Self::Day => 30.0,
            Self::Week => 4.345,
            Self::Month => 1.0,
        }
    }

    /// Short suffix used in column names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "m",
        }
    }

    /// Converts a whole number of days into this unit.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_days(self, days: i64) -> f64 {
        days as f64 / self.days()
    }
}

/// Meaning of the `frequency` feature handed to the frequency model.
///
/// Model eligibility does not depend on the convention: a customer needs
/// more than one transaction either way. The average order value always
/// divides by the total transaction count, so the monetary model is given
/// [`CustomerRecord::transactions`] under both conventions.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyConvention {
    /// All transactions, including the first one
    #[default]
    Total,
    /// Repeat transactions only (`total - 1`)
    Repeat,
}

impl FrequencyConvention {
    /// Model frequency for a customer with `transactions` purchases.
    #[must_use]
    pub fn frequency(self, transactions: u32) -> f64 {
        match self {
            Self::Total => f64::from(transactions),
            Self::Repeat => f64::from(transactions.saturating_sub(1)),
        }
    }
}

/// Per-customer features after aggregation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
    /// Number of distinct transactions
    pub transactions: u32,
    /// Model frequency, see [`FrequencyConvention`]
    pub frequency: f64,
    /// Time between first and last purchase
    pub recency: f64,
    /// Time between first purchase and the cutoff date
    #[serde(rename = "T")]
    pub t: f64,
    /// Total spend
    pub monetary: f64,
    /// Spend per transaction; only defined for repeat customers
    pub avg_monetary: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// Why a customer does not take part in model fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Exclusion {
    #[display("single transaction")]
    SingleTransaction,
    #[display("non-positive spend")]
    NonPositiveSpend,
}

impl CustomerRecord {
    /// Reason this customer cannot enter the models, if any.
    #[must_use]
    pub fn exclusion(&self) -> Option<Exclusion> {
        match self.avg_monetary {
            None => Some(Exclusion::SingleTransaction),
            Some(avg) if avg <= 0.0 => Some(Exclusion::NonPositiveSpend),
            Some(_) => None,
        }
    }

    /// Days since the last purchase, as used by RFM recency.
    #[must_use]
    pub fn days_since_last_purchase(&self, cutoff: NaiveDate) -> i64 {
        (cutoff - self.last_purchase).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Week.from_days(14), 2.0);
        assert_eq!(TimeUnit::Day.from_days(3), 3.0);
        assert_eq!(TimeUnit::Month.from_days(45), 1.5);
    }

    #[test]
    fn test_time_unit_parse() {
        assert_eq!("week".parse::<TimeUnit>().unwrap(), TimeUnit::Week);
        assert_eq!("Day".parse::<TimeUnit>().unwrap(), TimeUnit::Day);
    }

    #[test]
    fn test_frequency_convention() {
        assert_eq!(FrequencyConvention::Total.frequency(3), 3.0);
        assert_eq!(FrequencyConvention::Repeat.frequency(3), 2.0);
        assert_eq!(FrequencyConvention::Repeat.frequency(0), 0.0);
    }
}
