//! Customer lifetime value and RFM segmentation from transaction histories
//!
//! This crate turns a table of customer transactions into forward-looking
//! value estimates and behavioral segments.
//!
//! # Overview
//!
//! The crate supports two workflows:
//!
//! ## CLTV Forecasting Workflow
//!
//! 1. **Load Transactions** ([`transaction::TransactionTable`]): Invoice lines or
//!    per-customer channel summaries
//! 2. **Derive Features** ([`features::derive_customers`]): Clean the rows, clip
//!    outliers and aggregate recency, tenure, frequency and spend per customer
//! 3. **Fit Purchase Frequency** ([`bgnbd::BetaGeoFitter`]): BG/NBD model of
//!    transaction timing and dropout
//! 4. **Fit Monetary Value** ([`gamma_gamma::GammaGammaFitter`]): Gamma-Gamma
//!    model of the average transaction value
//! 5. **Project Value** ([`cltv::customer_lifetime_value`]): Discounted expected
//!    revenue over a horizon in months
//! 6. **Segment** ([`segment::segment`]): Quantile groups of the projected value
//!
//! [`pipeline::run_cltv`] runs all steps with a [`pipeline::PipelineConfig`].
//!
//! ## RFM Workflow
//!
//! 1. **Derive Features**: As above
//! 2. **Score** ([`rfm::score_customers`]): 1-5 recency, frequency and monetary
//!    scores by quantile rank
//! 3. **Classify** ([`rfm::classify`]): Ordered rule table from recency and
//!    frequency scores to named segments
//! 4. **Select Audiences** ([`audience::select_audience`]): Segment and
//!    category-interest filters for campaign lists
//!
//! [`pipeline::run_rfm`] runs all steps with a [`pipeline::RfmConfig`].
//!
//! # Models
//!
//! The models sit behind the traits in [`model`]: an estimator fits a model,
//! and the fitted model answers predictions from its hyperparameters alone.
//! Any [`model::FrequencyModel`] and [`model::MonetaryModel`] pair can be
//! combined by the CLTV projection.
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use clvkit_models::{
//!     bgnbd::BetaGeoParams,
//!     customer::FrequencyConvention,
//!     gamma_gamma::GammaGammaParams,
//!     pipeline::{PipelineConfig, run_cltv},
//!     simulate::{SimulationConfig, simulate_invoices},
//!     transaction::TransactionTable,
//! };
//!
//! let cutoff = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
//! let lines = simulate_invoices(&SimulationConfig {
//!     customers: 300,
//!     frequency: BetaGeoParams { r: 0.8, alpha: 4.0, a: 0.5, b: 3.0 },
//!     monetary: GammaGammaParams { p: 6.0, q: 4.0, v: 15.0 },
//!     start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
//!     cutoff,
//!     time_unit: Default::default(),
//!     seed: 42,
//!     country: None,
//! })?;
//!
//! let config = PipelineConfig {
//!     frequency_convention: FrequencyConvention::Repeat,
//!     ..PipelineConfig::new(cutoff)
//! };
//! let report = run_cltv(&TransactionTable::Invoices(lines), &config)?;
//!
//! for row in report.top_cltv(3) {
//!     println!("{} {:.2} {:?}", row.customer_id, row.cltv.unwrap_or_default(), row.segment);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audience;
pub mod bgnbd;
pub mod cltv;
pub mod customer;
pub mod features;
pub mod gamma_gamma;
pub mod model;
pub mod pipeline;
pub mod rfm;
pub mod segment;
pub mod simulate;
pub mod transaction;
