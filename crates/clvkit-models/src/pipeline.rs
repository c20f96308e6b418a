//! End-to-end CLTV and RFM runs
//!
//! [`run_cltv`] performs the full forecasting pipeline on one transaction
//! table:
//!
//! 1. Derive customer records (cleaning and outlier suppression included)
//! 2. Optionally restrict the population to one country
//! 3. Exclude customers that cannot enter the models (single transaction,
//!    non-positive spend) with a warning
//! 4. Fit the BG/NBD and Gamma-Gamma models on the remaining customers
//! 5. Predict expected sales for every configured horizon, the expected
//!    average value, the CLTV and any additional CLTV horizons
//! 6. Segment customers into quantile groups of CLTV and summarize the groups
//!
//! [`run_rfm`] derives records the same way and produces RFM scores,
//! segment summaries and an optional targeted audience.
//!
//! Both runs are pure functions of their input and configuration: the same
//! input always yields the same output.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    audience::{AudienceQuery, select_audience},
    bgnbd::{BetaGeoFitter, BetaGeoModel, BetaGeoParams},
    cltv::{ValueHorizon, ValueInputs, customer_lifetime_value},
    customer::{CustomerRecord, Exclusion, FrequencyConvention, TimeUnit},
    features::{DataQualityError, FeatureConfig, derive_customers},
    gamma_gamma::{GammaGammaFitter, GammaGammaModel, GammaGammaParams},
    model::{
        FitError, FrequencyEstimator as _, FrequencyModel as _, MonetaryEstimator as _,
        MonetaryModel as _,
    },
    rfm::{RfmRow, score_customers},
    segment::{SegmentError, SegmentSummary, segment, summarize_segments},
    transaction::TransactionTable,
};

/// Any failure of a pipeline run.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum PipelineError {
    #[display("invalid input data: {_0}")]
    DataQuality(DataQualityError),
    #[display("model fitting failed: {_0}")]
    Fit(FitError),
    #[display("segmentation failed: {_0}")]
    Segment(SegmentError),
    #[display("invalid configuration: {reason}")]
    #[from(skip)]
    InvalidConfig { reason: String },
}

/// Settings of a CLTV run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Analysis date; no transaction may be later
    pub cutoff: NaiveDate,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub frequency_convention: FrequencyConvention,
    #[serde(default = "default_true")]
    pub suppress_outliers: bool,
    /// Expected-sales horizons, in `time_unit`
    #[serde(default = "default_horizons")]
    pub horizons: Vec<u32>,
    /// CLTV projection length in months; segments are built on this value
    #[serde(default = "default_cltv_months")]
    pub cltv_months: u32,
    /// Further projection lengths in months, reported as `cltv_<m>m` columns
    #[serde(default)]
    pub cltv_horizons: Vec<u32>,
    /// Monthly discount rate
    #[serde(default = "default_discount_rate")]
    pub discount_rate: f64,
    #[serde(default = "default_frequency_penalizer")]
    pub frequency_penalizer: f64,
    #[serde(default = "default_monetary_penalizer")]
    pub monetary_penalizer: f64,
    /// Segment names from lowest to highest CLTV
    #[serde(default = "default_segment_labels")]
    pub segment_labels: Vec<String>,
    /// Restrict the run to customers of this country
    #[serde(default)]
    pub country: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_horizons() -> Vec<u32> {
    vec![12, 24]
}

fn default_cltv_months() -> u32 {
    6
}

fn default_discount_rate() -> f64 {
    0.01
}

fn default_frequency_penalizer() -> f64 {
    0.001
}

fn default_monetary_penalizer() -> f64 {
    0.01
}

fn default_segment_labels() -> Vec<String> {
    ["D", "C", "B", "A"].map(str::to_owned).to_vec()
}

impl PipelineConfig {
    /// Default settings for the given cutoff date.
    #[must_use]
    pub fn new(cutoff: NaiveDate) -> Self {
        Self {
            cutoff,
            time_unit: TimeUnit::default(),
            frequency_convention: FrequencyConvention::default(),
            suppress_outliers: true,
            horizons: default_horizons(),
            cltv_months: default_cltv_months(),
            cltv_horizons: vec![],
            discount_rate: default_discount_rate(),
            frequency_penalizer: default_frequency_penalizer(),
            monetary_penalizer: default_monetary_penalizer(),
            segment_labels: default_segment_labels(),
            country: None,
        }
    }

    #[must_use]
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            cutoff: self.cutoff,
            time_unit: self.time_unit,
            frequency_convention: self.frequency_convention,
            suppress_outliers: self.suppress_outliers,
        }
    }

    /// Projection settings for a `months`-month CLTV.
    #[must_use]
    pub fn value_horizon(&self, months: u32) -> ValueHorizon {
        ValueHorizon {
            months,
            time_unit: self.time_unit,
            discount_rate: self.discount_rate,
        }
    }

    /// Checks the settings that no later step can validate.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason: &str| {
            Err(PipelineError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };
        if !(self.discount_rate.is_finite() && self.discount_rate >= 0.0) {
            return invalid("discount rate must be a non-negative number");
        }
        if ![self.frequency_penalizer, self.monetary_penalizer]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
        {
            return invalid("penalizers must be non-negative numbers");
        }
        if self.segment_labels.is_empty() {
            return invalid("at least one segment label is required");
        }
        Ok(())
    }
}

/// Output row of a CLTV run.
///
/// Model outputs are `None` for customers excluded from the models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CltvRow {
    pub customer_id: String,
    pub recency: f64,
    #[serde(rename = "T")]
    pub t: f64,
    pub frequency: f64,
    pub monetary: f64,
    pub avg_monetary: Option<f64>,
    /// `exp_sales_<horizon><unit>` columns, e.g. `exp_sales_12w`
    #[serde(flatten)]
    pub expected_sales: BTreeMap<String, Option<f64>>,
    pub exp_average_value: Option<f64>,
    pub cltv: Option<f64>,
    /// `cltv_<months>m` columns for the additional CLTV horizons
    #[serde(flatten)]
    pub cltv_by_horizon: BTreeMap<String, Option<f64>>,
    pub segment: Option<String>,
    /// Why the customer was left out of the models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<String>,
}

/// Fitted parameters, output rows and segment summaries of a CLTV run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CltvReport {
    pub frequency_model: BetaGeoParams,
    pub monetary_model: GammaGammaParams,
    pub rows: Vec<CltvRow>,
    pub segments: Vec<SegmentSummary>,
}

impl CltvReport {
    /// The `n` rows with the largest value of `score`, best first.
    ///
    /// Rows without a score are skipped; equal scores keep row order.
    #[must_use]
    pub fn top_by<F>(&self, n: usize, score: F) -> Vec<&CltvRow>
    where
        F: Fn(&CltvRow) -> Option<f64>,
    {
        let mut scored = self
            .rows
            .iter()
            .filter_map(|row| score(row).map(|value| (value, row)))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(n).map(|(_, row)| row).collect()
    }

    /// The `n` customers with the highest CLTV.
    #[must_use]
    pub fn top_cltv(&self, n: usize) -> Vec<&CltvRow> {
        self.top_by(n, |row| row.cltv)
    }
}

/// Column name of the expected-sales prediction for `horizon`.
#[must_use]
pub fn expected_sales_column(horizon: u32, time_unit: TimeUnit) -> String {
    format!("exp_sales_{horizon}{}", time_unit.suffix())
}

/// Column name of the CLTV projected over `months` months.
#[must_use]
pub fn cltv_column(months: u32) -> String {
    format!("cltv_{months}m")
}

fn restrict_to_country(customers: &mut Vec<CustomerRecord>, country: Option<&str>) {
    if let Some(country) = country {
        let before = customers.len();
        customers.retain(|c| c.country.as_deref() == Some(country));
        tracing::info!(
            country,
            kept = customers.len(),
            dropped = before - customers.len(),
            "restricted population to country"
        );
    }
}

/// Runs the CLTV pipeline.
///
/// # Errors
///
/// Returns [`PipelineError`] for invalid settings, rejected input rows,
/// failed model fits and invalid segmentation settings.
pub fn run_cltv(
    table: &TransactionTable,
    config: &PipelineConfig,
) -> Result<CltvReport, PipelineError> {
    config.validate()?;
    let mut customers = derive_customers(table, &config.feature_config())?;
    restrict_to_country(&mut customers, config.country.as_deref());
    tracing::info!(
        rows = table.len(),
        customers = customers.len(),
        "derived customer features"
    );

    let mut eligible = vec![];
    let mut exclusions = BTreeMap::<String, usize>::new();
    for (index, customer) in customers.iter().enumerate() {
        match customer.exclusion() {
            None => eligible.push(index),
            Some(reason) => *exclusions.entry(reason.to_string()).or_default() += 1,
        }
    }
    if !exclusions.is_empty() {
        tracing::warn!(
            excluded = customers.len() - eligible.len(),
            reasons = ?exclusions,
            "customers excluded from model fitting"
        );
    }

    let column = |f: fn(&CustomerRecord) -> f64| {
        eligible
            .iter()
            .map(|&i| f(&customers[i]))
            .collect::<Vec<_>>()
    };
    let frequency = column(|c| c.frequency);
    let recency = column(|c| c.recency);
    let t = column(|c| c.t);
    // avg_monetary is a mean over all transactions whatever the convention
    let transactions = column(|c| f64::from(c.transactions));
    let avg_monetary = column(|c| c.avg_monetary.unwrap_or_default());

    let frequency_model =
        BetaGeoFitter::new(config.frequency_penalizer).fit(&frequency, &recency, &t)?;
    let monetary_model =
        GammaGammaFitter::new(config.monetary_penalizer).fit(&transactions, &avg_monetary)?;

    let predictions = (0..eligible.len())
        .map(|j| {
            let inputs = ValueInputs {
                frequency: frequency[j],
                recency: recency[j],
                t: t[j],
                transactions: transactions[j],
                avg_monetary: avg_monetary[j],
            };
            predict_customer(&frequency_model, &monetary_model, &inputs, config)
        })
        .collect::<Vec<_>>();

    let cltv = predictions.iter().map(|p| p.cltv).collect::<Vec<_>>();
    let labels = segment(&cltv, config.segment_labels.len(), &config.segment_labels)?;
    let monetary = column(|c| c.monetary);
    let exp_average_value = predictions
        .iter()
        .map(|p| p.exp_average_value)
        .collect::<Vec<_>>();
    let summaries = summarize_segments(
        &labels,
        &[
            ("recency", &recency[..]),
            ("T", &t[..]),
            ("frequency", &frequency[..]),
            ("monetary", &monetary[..]),
            ("exp_average_value", &exp_average_value[..]),
            ("cltv", &cltv[..]),
        ],
    );

    let mut rows = customers
        .iter()
        .map(|customer| CltvRow {
            customer_id: customer.customer_id.clone(),
            recency: customer.recency,
            t: customer.t,
            frequency: customer.frequency,
            monetary: customer.monetary,
            avg_monetary: customer.avg_monetary,
            expected_sales: config
                .horizons
                .iter()
                .map(|&h| (expected_sales_column(h, config.time_unit), None))
                .collect(),
            exp_average_value: None,
            cltv: None,
            cltv_by_horizon: config
                .cltv_horizons
                .iter()
                .map(|&months| (cltv_column(months), None))
                .collect(),
            segment: None,
            excluded: customer.exclusion().as_ref().map(Exclusion::to_string),
        })
        .collect::<Vec<_>>();
    for ((&index, prediction), label) in eligible.iter().zip(predictions).zip(labels) {
        let row = &mut rows[index];
        row.expected_sales = prediction.expected_sales;
        row.exp_average_value = Some(prediction.exp_average_value);
        row.cltv = Some(prediction.cltv);
        row.cltv_by_horizon = prediction.cltv_by_horizon;
        row.segment = Some(label.clone());
    }

    Ok(CltvReport {
        frequency_model: frequency_model.params(),
        monetary_model: monetary_model.params(),
        rows,
        segments: summaries,
    })
}

struct Prediction {
    expected_sales: BTreeMap<String, Option<f64>>,
    exp_average_value: f64,
    cltv: f64,
    cltv_by_horizon: BTreeMap<String, Option<f64>>,
}

fn predict_customer(
    frequency_model: &BetaGeoModel,
    monetary_model: &GammaGammaModel,
    inputs: &ValueInputs,
    config: &PipelineConfig,
) -> Prediction {
    let expected_sales = config
        .horizons
        .iter()
        .map(|&h| {
            let sales =
                frequency_model.predict(f64::from(h), inputs.frequency, inputs.recency, inputs.t);
            (expected_sales_column(h, config.time_unit), Some(sales))
        })
        .collect();
    let cltv = |months| {
        customer_lifetime_value(
            frequency_model,
            monetary_model,
            inputs,
            &config.value_horizon(months),
        )
    };
    Prediction {
        expected_sales,
        exp_average_value: monetary_model
            .conditional_expected_average_profit(inputs.transactions, inputs.avg_monetary),
        cltv: cltv(config.cltv_months),
        cltv_by_horizon: config
            .cltv_horizons
            .iter()
            .map(|&months| (cltv_column(months), Some(cltv(months))))
            .collect(),
    }
}

/// Settings of an RFM run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RfmConfig {
    pub cutoff: NaiveDate,
    #[serde(default = "default_true")]
    pub suppress_outliers: bool,
    #[serde(default)]
    pub country: Option<String>,
    /// Audience to select from the scored customers
    #[serde(default)]
    pub audience: Option<AudienceQuery>,
}

impl RfmConfig {
    #[must_use]
    pub fn new(cutoff: NaiveDate) -> Self {
        Self {
            cutoff,
            suppress_outliers: true,
            country: None,
            audience: None,
        }
    }
}

/// Scores, segment summaries and audience of an RFM run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmReport {
    pub rows: Vec<RfmRow>,
    pub segments: Vec<SegmentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
}

/// Runs RFM scoring and segmentation.
///
/// # Errors
///
/// Returns [`PipelineError::DataQuality`] for rejected input rows.
pub fn run_rfm(table: &TransactionTable, config: &RfmConfig) -> Result<RfmReport, PipelineError> {
    let features = FeatureConfig {
        suppress_outliers: config.suppress_outliers,
        ..FeatureConfig::new(config.cutoff)
    };
    let mut customers = derive_customers(table, &features)?;
    restrict_to_country(&mut customers, config.country.as_deref());

    let rows = score_customers(&customers, config.cutoff);
    let assigned = rows.iter().map(|row| row.segment.to_string()).collect::<Vec<_>>();
    #[expect(clippy::cast_precision_loss)]
    let recency = rows.iter().map(|row| row.recency as f64).collect::<Vec<_>>();
    let frequency = rows.iter().map(|row| f64::from(row.frequency)).collect::<Vec<_>>();
    let monetary = rows.iter().map(|row| row.monetary).collect::<Vec<_>>();
    let segments = summarize_segments(
        &assigned,
        &[
            ("recency", &recency[..]),
            ("frequency", &frequency[..]),
            ("monetary", &monetary[..]),
        ],
    );
    let audience = config
        .audience
        .as_ref()
        .map(|query| select_audience(&rows, query));
    tracing::info!(
        customers = rows.len(),
        segments = segments.len(),
        "scored RFM segments"
    );

    Ok(RfmReport {
        rows,
        segments,
        audience,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cutoff = NaiveDate::from_ymd_opt(2011, 12, 11).unwrap();
        let config = PipelineConfig::new(cutoff);
        assert!(config.validate().is_ok());
        assert_eq!(config.time_unit, TimeUnit::Week);
        assert_eq!(config.horizons, vec![12, 24]);
        assert_eq!(config.segment_labels, vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"cutoff": "2021-06-01", "cltv_months": 3, "country": "UK"}"#)
                .unwrap();
        let expected = PipelineConfig {
            cltv_months: 3,
            country: Some("UK".to_owned()),
            ..PipelineConfig::new(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_invalid_config() {
        let cutoff = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let negative = PipelineConfig {
            discount_rate: -0.5,
            ..PipelineConfig::new(cutoff)
        };
        assert!(matches!(
            negative.validate(),
            Err(PipelineError::InvalidConfig { .. })
        ));
        let no_labels = PipelineConfig {
            segment_labels: vec![],
            ..PipelineConfig::new(cutoff)
        };
        assert!(no_labels.validate().is_err());
    }

    #[test]
    fn test_expected_sales_column() {
        assert_eq!(expected_sales_column(12, TimeUnit::Week), "exp_sales_12w");
        assert_eq!(expected_sales_column(90, TimeUnit::Day), "exp_sales_90d");
    }

    #[test]
    fn test_cltv_horizon_columns() {
        assert_eq!(cltv_column(1), "cltv_1m");
        assert_eq!(cltv_column(12), "cltv_12m");

        let config: PipelineConfig =
            serde_json::from_str(r#"{"cutoff": "2021-06-01", "cltv_horizons": [1, 12]}"#).unwrap();
        assert_eq!(config.cltv_horizons, vec![1, 12]);
        assert_eq!(config.cltv_months, 6);
        assert_eq!(config.value_horizon(12).months, 12);
    }
}
