//! Feature derivation: transaction rows to per-customer records
//!
//! This module turns a [`TransactionTable`] into [`CustomerRecord`]s holding
//! recency, tenure (`T`), frequency and monetary features.
//!
//! # Pipeline
//!
//! ## Invoice lines
//!
//! 1. Drop cancelled invoices (number starting with `C`), lines without a
//!    customer, and lines with non-positive quantity or price
//! 2. Clip outliers in `quantity` and `price` (P01/P99 quantile-IQR rule)
//! 3. Line total = `quantity * price`
//! 4. Group by customer: distinct invoices, total spend, first/last date
//!
//! ## Channel summaries
//!
//! 1. Clip outliers in the four online/offline order-count and spend columns
//! 2. Orders = online + offline orders, spend = online + offline spend
//!
//! In both cases the time features are then computed against the cutoff date:
//!
//! - `recency = (last - first)` in the configured [`TimeUnit`]
//! - `T = (cutoff - first)` in the same unit
//! - `avg_monetary = monetary / transactions`, for customers with more than
//!   one transaction only
//!
//! A purchase date after the cutoff, or a last purchase before the first one,
//! is rejected with a [`DataQualityError`].
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use clvkit_models::{
//!     features::{FeatureConfig, derive_customers},
//!     transaction::{InvoiceLine, TransactionTable},
//! };
//!
//! let date = |d| NaiveDate::from_ymd_opt(2021, 3, d).unwrap();
//! let line = |invoice: &str, day| InvoiceLine {
//!     invoice: invoice.into(),
//!     customer_id: Some("c1".into()),
//!     invoice_date: date(day),
//!     quantity: 2.0,
//!     price: 5.0,
//!     country: None,
//! };
//! let table = TransactionTable::Invoices(vec![line("1", 1), line("2", 15)]);
//! let customers = derive_customers(&table, &FeatureConfig::new(date(29))).unwrap();
//!
//! assert_eq!(customers[0].transactions, 2);
//! assert_eq!(customers[0].recency, 2.0);
//! assert_eq!(customers[0].t, 4.0);
//! assert_eq!(customers[0].avg_monetary, Some(10.0));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use clvkit_stats::outlier::OutlierRule;
use serde::{Deserialize, Serialize};

use crate::{
    customer::{CustomerRecord, FrequencyConvention, TimeUnit},
    transaction::{ChannelSummary, InvoiceLine, TransactionTable},
};

/// Input rows that cannot be turned into valid features.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum DataQualityError {
    #[display(
        "customer {customer_id}: first purchase {first_purchase} is after the cutoff date {cutoff}"
    )]
    FirstPurchaseAfterCutoff {
        customer_id: String,
        first_purchase: NaiveDate,
        cutoff: NaiveDate,
    },
    #[display(
        "customer {customer_id}: last purchase {last_purchase} is after the cutoff date {cutoff}"
    )]
    LastPurchaseAfterCutoff {
        customer_id: String,
        last_purchase: NaiveDate,
        cutoff: NaiveDate,
    },
    #[display(
        "customer {customer_id}: last purchase {last_purchase} precedes first purchase {first_purchase}"
    )]
    LastPurchaseBeforeFirst {
        customer_id: String,
        first_purchase: NaiveDate,
        last_purchase: NaiveDate,
    },
    #[display("customer {customer_id}: {column} must be a non-negative number, got {value}")]
    InvalidAmount {
        customer_id: String,
        column: &'static str,
        value: f64,
    },
}

/// Settings for feature derivation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeatureConfig {
    /// Analysis date all time features are measured against
    pub cutoff: NaiveDate,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub frequency_convention: FrequencyConvention,
    /// Clip outliers before aggregating
    #[serde(default = "default_suppress_outliers")]
    pub suppress_outliers: bool,
}

fn default_suppress_outliers() -> bool {
    true
}

impl FeatureConfig {
    /// Weekly features, total-count frequency, outlier suppression enabled.
    #[must_use]
    pub fn new(cutoff: NaiveDate) -> Self {
        Self {
            cutoff,
            time_unit: TimeUnit::default(),
            frequency_convention: FrequencyConvention::default(),
            suppress_outliers: true,
        }
    }
}

/// Derives one record per customer from either input shape.
///
/// Invoice input yields records ordered by customer id; channel-summary input
/// keeps the input row order.
pub fn derive_customers(
    table: &TransactionTable,
    config: &FeatureConfig,
) -> Result<Vec<CustomerRecord>, DataQualityError> {
    match table {
        TransactionTable::Invoices(rows) => from_invoices(rows, config),
        TransactionTable::ChannelSummaries(rows) => from_channel_summaries(rows, config),
    }
}

fn suppress_column(values: &mut [f64], column: &str) {
    if let Some((thresholds, replaced)) = OutlierRule::default().suppress(values)
        && replaced > 0
    {
        tracing::debug!(
            column,
            replaced,
            low = thresholds.low,
            high = thresholds.high,
            "suppressed outliers"
        );
    }
}

#[derive(Debug)]
struct CustomerAccumulator<'a> {
    invoices: BTreeSet<&'a str>,
    first: NaiveDate,
    last: NaiveDate,
    spend: f64,
    country: Option<&'a str>,
}

fn from_invoices(
    rows: &[InvoiceLine],
    config: &FeatureConfig,
) -> Result<Vec<CustomerRecord>, DataQualityError> {
    let lines = rows
        .iter()
        .filter(|line| {
            !line.is_cancellation()
                && line.customer_id.is_some()
                && line.quantity > 0.0
                && line.price > 0.0
        })
        .collect::<Vec<_>>();
    let dropped = rows.len() - lines.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped cancelled or incomplete invoice lines");
    }

    let mut quantity = lines.iter().map(|line| line.quantity).collect::<Vec<_>>();
    let mut price = lines.iter().map(|line| line.price).collect::<Vec<_>>();
    if config.suppress_outliers {
        suppress_column(&mut quantity, "quantity");
        suppress_column(&mut price, "price");
    }

    let mut customers: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    for ((line, quantity), price) in lines.iter().zip(quantity).zip(price) {
        let Some(customer_id) = line.customer_id.as_deref() else {
            continue;
        };
        let acc = customers
            .entry(customer_id)
            .or_insert_with(|| CustomerAccumulator {
                invoices: BTreeSet::new(),
                first: line.invoice_date,
                last: line.invoice_date,
                spend: 0.0,
                country: line.country.as_deref(),
            });
        acc.invoices.insert(&line.invoice);
        acc.first = acc.first.min(line.invoice_date);
        acc.last = acc.last.max(line.invoice_date);
        acc.spend += quantity * price;
    }

    customers
        .into_iter()
        .map(|(customer_id, acc)| {
            let transactions = u32::try_from(acc.invoices.len()).unwrap_or(u32::MAX);
            build_record(
                RecordParts {
                    customer_id: customer_id.to_owned(),
                    first: acc.first,
                    last: acc.last,
                    transactions,
                    monetary: acc.spend,
                    country: acc.country.map(str::to_owned),
                    interests: vec![],
                },
                config,
            )
        })
        .collect()
}

fn from_channel_summaries(
    rows: &[ChannelSummary],
    config: &FeatureConfig,
) -> Result<Vec<CustomerRecord>, DataQualityError> {
    let column = |f: fn(&ChannelSummary) -> f64| rows.iter().map(f).collect::<Vec<_>>();
    let mut orders_online = column(|row| row.order_num_total_ever_online);
    let mut orders_offline = column(|row| row.order_num_total_ever_offline);
    let mut value_offline = column(|row| row.customer_value_total_ever_offline);
    let mut value_online = column(|row| row.customer_value_total_ever_online);

    for (row, values) in rows.iter().zip(
        orders_online
            .iter()
            .zip(&orders_offline)
            .zip(value_offline.iter().zip(&value_online)),
    ) {
        let ((online, offline), (value_off, value_on)) = values;
        for (column, value) in [
            ("order_num_total_ever_online", *online),
            ("order_num_total_ever_offline", *offline),
            ("customer_value_total_ever_offline", *value_off),
            ("customer_value_total_ever_online", *value_on),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DataQualityError::InvalidAmount {
                    customer_id: row.master_id.clone(),
                    column,
                    value,
                });
            }
        }
    }

    if config.suppress_outliers {
        suppress_column(&mut orders_online, "order_num_total_ever_online");
        suppress_column(&mut orders_offline, "order_num_total_ever_offline");
        suppress_column(&mut value_offline, "customer_value_total_ever_offline");
        suppress_column(&mut value_online, "customer_value_total_ever_online");
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let orders = (orders_online[i] + orders_offline[i]).round().max(0.0);
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let transactions = orders.min(f64::from(u32::MAX)) as u32;
            build_record(
                RecordParts {
                    customer_id: row.master_id.clone(),
                    first: row.first_order_date,
                    last: row.last_order_date,
                    transactions,
                    monetary: value_offline[i] + value_online[i],
                    country: None,
                    interests: row.interests(),
                },
                config,
            )
        })
        .collect()
}

struct RecordParts {
    customer_id: String,
    first: NaiveDate,
    last: NaiveDate,
    transactions: u32,
    monetary: f64,
    country: Option<String>,
    interests: Vec<String>,
}

fn build_record(
    parts: RecordParts,
    config: &FeatureConfig,
) -> Result<CustomerRecord, DataQualityError> {
    let RecordParts {
        customer_id,
        first,
        last,
        transactions,
        monetary,
        country,
        interests,
    } = parts;
    let cutoff = config.cutoff;

    if first > cutoff {
        return Err(DataQualityError::FirstPurchaseAfterCutoff {
            customer_id,
            first_purchase: first,
            cutoff,
        });
    }
    if last < first {
        return Err(DataQualityError::LastPurchaseBeforeFirst {
            customer_id,
            first_purchase: first,
            last_purchase: last,
        });
    }
    if last > cutoff {
        return Err(DataQualityError::LastPurchaseAfterCutoff {
            customer_id,
            last_purchase: last,
            cutoff,
        });
    }

    let unit = config.time_unit;
    let avg_monetary = (transactions > 1).then(|| monetary / f64::from(transactions));
    Ok(CustomerRecord {
        customer_id,
        first_purchase: first,
        last_purchase: last,
        transactions,
        frequency: config.frequency_convention.frequency(transactions),
        recency: unit.from_days((last - first).num_days()),
        t: unit.from_days((cutoff - first).num_days()),
        monetary,
        avg_monetary,
        country,
        interests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, month, day).unwrap()
    }

    fn line(
        invoice: &str,
        customer: &str,
        day: NaiveDate,
        quantity: f64,
        price: f64,
    ) -> InvoiceLine {
        InvoiceLine {
            invoice: invoice.to_owned(),
            customer_id: Some(customer.to_owned()),
            invoice_date: day,
            quantity,
            price,
            country: Some("United Kingdom".to_owned()),
        }
    }

    fn summary(id: &str, first: NaiveDate, last: NaiveDate, orders: (f64, f64)) -> ChannelSummary {
        ChannelSummary {
            master_id: id.to_owned(),
            order_channel: Some("Android App".to_owned()),
            last_order_channel: Some("Offline".to_owned()),
            first_order_date: first,
            last_order_date: last,
            last_order_date_online: Some(last),
            last_order_date_offline: None,
            order_num_total_ever_online: orders.0,
            order_num_total_ever_offline: orders.1,
            customer_value_total_ever_offline: 50.0 * orders.1,
            customer_value_total_ever_online: 40.0 * orders.0,
            interested_in_categories_12: Some("[KADIN]".to_owned()),
        }
    }

    fn no_outliers(cutoff: NaiveDate) -> FeatureConfig {
        FeatureConfig {
            suppress_outliers: false,
            ..FeatureConfig::new(cutoff)
        }
    }

    fn find<'a>(customers: &'a [CustomerRecord], id: &str) -> &'a CustomerRecord {
        customers.iter().find(|c| c.customer_id == id).unwrap()
    }

    #[test]
    fn test_invoices_grouped_by_distinct_invoice() {
        let table = TransactionTable::Invoices(vec![
            line("100", "a", date(1, 4), 2.0, 3.0),
            line("100", "a", date(1, 4), 1.0, 4.0),
            line("101", "a", date(1, 18), 1.0, 10.0),
            line("102", "b", date(2, 1), 5.0, 1.0),
        ]);
        let customers = derive_customers(&table, &no_outliers(date(3, 1))).unwrap();

        assert_eq!(customers.len(), 2);
        let a = &customers[0];
        assert_eq!(a.customer_id, "a");
        assert_eq!(a.transactions, 2);
        assert_eq!(a.monetary, 20.0);
        assert_eq!(a.avg_monetary, Some(10.0));
        assert_eq!(a.recency, 2.0);
        assert_eq!(a.t, 8.0);
        assert_eq!(a.country.as_deref(), Some("United Kingdom"));

        let b = &customers[1];
        assert_eq!(b.transactions, 1);
        assert_eq!(b.avg_monetary, None);
        assert_eq!(b.recency, 0.0);
    }

    #[test]
    fn test_cancellations_and_invalid_lines_dropped() {
        let mut guest = line("200", "x", date(1, 1), 1.0, 1.0);
        guest.customer_id = None;
        let table = TransactionTable::Invoices(vec![
            line("C100", "a", date(1, 4), 2.0, 3.0),
            line("101", "a", date(1, 5), -1.0, 3.0),
            line("102", "a", date(1, 6), 1.0, 0.0),
            line("103", "a", date(1, 7), 1.0, 2.0),
            guest,
        ]);
        let customers = derive_customers(&table, &no_outliers(date(3, 1))).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].transactions, 1);
        assert_eq!(customers[0].monetary, 2.0);
    }

    #[test]
    fn test_invoice_quantity_and_price_clipped() {
        // quantities 1..=10 thirty times each: P01 = 1, P99 = 10, upper fence 23.5
        // prices 1..=300: P01 = 4, P99 = 298, upper fence 739
        let mut rows = (0..300_u32)
            .map(|i| {
                let id = format!("n{i}");
                let quantity = f64::from(1 + i % 10);
                line(&id, &id, date(1, 4), quantity, f64::from(i + 1))
            })
            .collect::<Vec<_>>();
        rows.push(line("whale", "whale", date(1, 4), 5000.0, 1e7));
        let table = TransactionTable::Invoices(rows);

        let clipped = derive_customers(&table, &FeatureConfig::new(date(3, 1))).unwrap();
        assert_eq!(find(&clipped, "whale").monetary, 24.0 * 739.0);
        assert_eq!(find(&clipped, "n0").monetary, 1.0);
        assert_eq!(find(&clipped, "n299").monetary, 10.0 * 300.0);

        let raw = derive_customers(&table, &no_outliers(date(3, 1))).unwrap();
        assert_eq!(find(&raw, "whale").monetary, 5000.0 * 1e7);
    }

    #[test]
    fn test_channel_summary_columns_clipped() {
        let mut rows = (0..300_u32)
            .map(|i| {
                let mut row = summary(&format!("s{i}"), date(1, 1), date(2, 1), (2.0, 0.0));
                // spend 0..=299: P01 = 3, P99 = 297, upper fence 738
                row.customer_value_total_ever_online = f64::from(i);
                // orders 1..=10 thirty times each: upper fence 23.5
                row.order_num_total_ever_offline = f64::from(1 + i % 10);
                row
            })
            .collect::<Vec<_>>();
        rows[7].customer_value_total_ever_online = 1e7;
        rows[9].order_num_total_ever_offline = 5000.0;
        let table = TransactionTable::ChannelSummaries(rows);

        let customers = derive_customers(&table, &FeatureConfig::new(date(3, 1))).unwrap();
        let big_spender = &customers[7];
        assert_eq!(big_spender.monetary, 738.0);
        assert_eq!(big_spender.transactions, 2 + 8);
        let frequent = &customers[9];
        assert_eq!(frequent.transactions, 2 + 24);
        assert_eq!(frequent.monetary, 9.0);
        assert_eq!(customers[299].monetary, 299.0);
    }

    #[test]
    fn test_recency_never_exceeds_t() {
        let rows = (1..28)
            .map(|day| {
                let customer = format!("c{}", day % 5);
                line(&day.to_string(), &customer, date(1, day), f64::from(day), 1.0)
            })
            .collect();
        let table = TransactionTable::Invoices(rows);
        let customers = derive_customers(&table, &FeatureConfig::new(date(2, 1))).unwrap();
        assert_eq!(customers.len(), 5);
        for customer in &customers {
            assert!(customer.recency <= customer.t);
        }
    }

    #[test]
    fn test_first_purchase_after_cutoff_rejected() {
        let table = TransactionTable::Invoices(vec![line("1", "late", date(4, 1), 1.0, 1.0)]);
        let err = derive_customers(&table, &no_outliers(date(3, 1))).unwrap_err();
        let DataQualityError::FirstPurchaseAfterCutoff { customer_id, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(customer_id, "late");
    }

    #[test]
    fn test_last_purchase_after_cutoff_rejected() {
        let rows = vec![summary("s1", date(1, 1), date(5, 1), (2.0, 1.0))];
        let table = TransactionTable::ChannelSummaries(rows);
        let err = derive_customers(&table, &no_outliers(date(3, 1))).unwrap_err();
        assert!(matches!(err, DataQualityError::LastPurchaseAfterCutoff { .. }));
    }

    #[test]
    fn test_last_before_first_rejected() {
        let rows = vec![summary("s1", date(2, 1), date(1, 1), (2.0, 1.0))];
        let table = TransactionTable::ChannelSummaries(rows);
        let err = derive_customers(&table, &no_outliers(date(3, 1))).unwrap_err();
        assert!(matches!(err, DataQualityError::LastPurchaseBeforeFirst { .. }));
    }

    #[test]
    fn test_channel_summaries_combined() {
        let rows = vec![
            summary("s1", date(1, 1), date(2, 26), (3.0, 1.0)),
            summary("s2", date(2, 1), date(2, 1), (1.0, 0.0)),
        ];
        let table = TransactionTable::ChannelSummaries(rows);
        let customers = derive_customers(&table, &no_outliers(date(3, 5))).unwrap();
        let s1 = &customers[0];
        assert_eq!(s1.transactions, 4);
        assert_eq!(s1.frequency, 4.0);
        assert_eq!(s1.monetary, 170.0);
        assert_eq!(s1.avg_monetary, Some(42.5));
        assert_eq!(s1.recency, 8.0);
        assert_eq!(s1.t, 9.0);
        assert_eq!(s1.interests, vec!["KADIN"]);
        assert_eq!(
            customers[1].exclusion(),
            Some(crate::customer::Exclusion::SingleTransaction)
        );
    }

    #[test]
    fn test_repeat_convention() {
        let rows = vec![summary("s1", date(1, 1), date(2, 26), (3.0, 1.0))];
        let table = TransactionTable::ChannelSummaries(rows);
        let config = FeatureConfig {
            frequency_convention: FrequencyConvention::Repeat,
            ..no_outliers(date(3, 5))
        };
        let customers = derive_customers(&table, &config).unwrap();
        assert_eq!(customers[0].frequency, 3.0);
        assert_eq!(customers[0].transactions, 4);
        assert_eq!(customers[0].avg_monetary, Some(42.5));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut row = summary("s1", date(1, 1), date(2, 1), (3.0, 1.0));
        row.customer_value_total_ever_online = -5.0;
        let table = TransactionTable::ChannelSummaries(vec![row]);
        let err = derive_customers(&table, &no_outliers(date(3, 5))).unwrap_err();
        assert!(matches!(
            err,
            DataQualityError::InvalidAmount {
                column: "customer_value_total_ever_online",
                ..
            }
        ));
    }
}
