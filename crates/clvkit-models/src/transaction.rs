//! Input row shapes for customer transaction history
//!
//! Two feeds occur in practice and both are accepted:
//!
//! - **Invoice lines**: one row per purchased item on an invoice, as exported
//!   by an order system. Several rows may share an invoice number.
//! - **Channel summaries**: one row per customer with lifetime order counts
//!   and spend split into online and offline channels.
//!
//! Both are normalized into [`CustomerRecord`](crate::customer::CustomerRecord)s
//! by the [`features`](crate::features) module.
//!
//! # Serialization
//!
//! A table is tagged with its shape:
//!
//! ```json
//! {
//!   "shape": "invoices",
//!   "rows": [
//!     {
//!       "invoice": "536365",
//!       "customer_id": "17850",
//!       "invoice_date": "2010-12-01",
//!       "quantity": 6.0,
//!       "price": 2.55,
//!       "country": "United Kingdom"
//!     }
//!   ]
//! }
//! ```
//!
//! ```
//! use clvkit_models::transaction::TransactionTable;
//!
//! let json = r#"{"shape": "channel_summaries", "rows": []}"#;
//! let table: TransactionTable = serde_json::from_str(json).unwrap();
//! assert!(table.is_empty());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A customer-transaction table in one of the supported shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "shape", content = "rows", rename_all = "snake_case")]
pub enum TransactionTable {
    /// Raw invoice lines
    Invoices(Vec<InvoiceLine>),
    /// Pre-aggregated per-customer channel summaries
    ChannelSummaries(Vec<ChannelSummary>),
}

impl TransactionTable {
    /// Number of input rows
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Invoices(rows) => rows.len(),
            Self::ChannelSummaries(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest purchase date appearing anywhere in the table.
    #[must_use]
    pub fn latest_purchase(&self) -> Option<NaiveDate> {
        match self {
            Self::Invoices(rows) => rows.iter().map(|row| row.invoice_date).max(),
            Self::ChannelSummaries(rows) => rows.iter().map(|row| row.last_order_date).max(),
        }
    }
}

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InvoiceLine {
    /// Invoice number; a leading `C` marks a cancellation
    pub invoice: String,
    /// Purchasing customer, missing for guest checkouts
    #[serde(default)]
    pub customer_id: Option<String>,
    pub invoice_date: NaiveDate,
    /// Number of units purchased
    pub quantity: f64,
    /// Unit price
    pub price: f64,
    #[serde(default)]
    pub country: Option<String>,
}

impl InvoiceLine {
    /// Whether this line belongs to a cancelled invoice.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.invoice.starts_with('C')
    }
}

/// Lifetime order summary of a single customer, split by channel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChannelSummary {
    /// Customer identifier
    pub master_id: String,
    /// Channel of the customer's first order
    #[serde(default)]
    pub order_channel: Option<String>,
    /// Channel of the customer's most recent order
    #[serde(default)]
    pub last_order_channel: Option<String>,
    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,
    #[serde(default)]
    pub last_order_date_online: Option<NaiveDate>,
    #[serde(default)]
    pub last_order_date_offline: Option<NaiveDate>,
    pub order_num_total_ever_online: f64,
    pub order_num_total_ever_offline: f64,
    pub customer_value_total_ever_offline: f64,
    pub customer_value_total_ever_online: f64,
    /// Category tags the customer bought from in the last 12 months,
    /// e.g. `"[KADIN, AKTIFSPOR]"`
    #[serde(default)]
    pub interested_in_categories_12: Option<String>,
}

impl ChannelSummary {
    /// Splits the category-interest field into individual tags.
    ///
    /// ```
    /// # use clvkit_models::transaction::ChannelSummary;
    /// # use chrono::NaiveDate;
    /// # let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    /// # let summary = ChannelSummary {
    /// #     master_id: "c1".into(), order_channel: None, last_order_channel: None,
    /// #     first_order_date: date, last_order_date: date,
    /// #     last_order_date_online: None, last_order_date_offline: None,
    /// #     order_num_total_ever_online: 1.0, order_num_total_ever_offline: 0.0,
    /// #     customer_value_total_ever_offline: 0.0, customer_value_total_ever_online: 10.0,
    /// #     interested_in_categories_12: Some("[KADIN, AKTIFSPOR]".into()),
    /// # };
    /// assert_eq!(summary.interests(), vec!["KADIN", "AKTIFSPOR"]);
    /// ```
    #[must_use]
    pub fn interests(&self) -> Vec<String> {
        self.interested_in_categories_12
            .as_deref()
            .unwrap_or_default()
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
