use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clvkit_models::{
    customer::{FrequencyConvention, TimeUnit},
    pipeline::{CltvReport, CltvRow, PipelineConfig, expected_sales_column, run_cltv},
};

use crate::util::{self, Output};

/// Score used to rank customers for `--top`
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum RankBy {
    /// Projected customer lifetime value
    #[default]
    Cltv,
    /// Expected average transaction value
    Value,
    /// Expected number of purchases over the longest horizon
    Sales,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CltvArg {
    /// Transactions JSON file
    input: PathBuf,
    /// Pipeline settings JSON file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Analysis date (YYYY-MM-DD); defaults to two days after the latest purchase
    #[arg(long)]
    cutoff: Option<NaiveDate>,
    /// Time unit for recency, T and horizons (day, week, month)
    #[arg(long)]
    time_unit: Option<TimeUnit>,
    /// Frequency fed to the models (total, repeat)
    #[arg(long)]
    frequency_convention: Option<FrequencyConvention>,
    /// Expected-sales horizons in time units, comma separated
    #[arg(long, value_delimiter = ',')]
    horizons: Option<Vec<u32>>,
    /// CLTV projection length in months
    #[arg(long)]
    months: Option<u32>,
    /// Additional CLTV projection lengths in months, comma separated
    #[arg(long, value_delimiter = ',')]
    cltv_horizons: Option<Vec<u32>>,
    /// Monthly discount rate
    #[arg(long)]
    discount_rate: Option<f64>,
    /// Penalizer coefficient of the BG/NBD fit
    #[arg(long)]
    frequency_penalizer: Option<f64>,
    /// Penalizer coefficient of the Gamma-Gamma fit
    #[arg(long)]
    monetary_penalizer: Option<f64>,
    /// Segment labels from lowest to highest CLTV, comma separated
    #[arg(long, value_delimiter = ',')]
    segment_labels: Option<Vec<String>>,
    /// Only analyze customers from this country
    #[arg(long)]
    country: Option<String>,
    /// Keep extreme quantities and amounts unchanged
    #[arg(long)]
    no_outlier_suppression: bool,
    /// Only write the N highest-ranked customers
    #[arg(long)]
    top: Option<usize>,
    /// Score for `--top` (cltv, value, sales)
    #[arg(long, default_value = "cltv")]
    rank_by: RankBy,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CltvArg {
    fn pipeline_config(&self, cutoff: Option<NaiveDate>) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => util::read_json_file::<PipelineConfig, _>("pipeline config", path)?,
            None => PipelineConfig::new(cutoff.context("An analysis date is required")?),
        };
        if let Some(cutoff) = cutoff {
            config.cutoff = cutoff;
        }
        if let Some(time_unit) = self.time_unit {
            config.time_unit = time_unit;
        }
        if let Some(convention) = self.frequency_convention {
            config.frequency_convention = convention;
        }
        if let Some(horizons) = &self.horizons {
            config.horizons.clone_from(horizons);
        }
        if let Some(months) = self.months {
            config.cltv_months = months;
        }
        if let Some(horizons) = &self.cltv_horizons {
            config.cltv_horizons.clone_from(horizons);
        }
        if let Some(rate) = self.discount_rate {
            config.discount_rate = rate;
        }
        if let Some(penalizer) = self.frequency_penalizer {
            config.frequency_penalizer = penalizer;
        }
        if let Some(penalizer) = self.monetary_penalizer {
            config.monetary_penalizer = penalizer;
        }
        if let Some(labels) = &self.segment_labels {
            config.segment_labels.clone_from(labels);
        }
        if self.country.is_some() {
            config.country.clone_from(&self.country);
        }
        if self.no_outlier_suppression {
            config.suppress_outliers = false;
        }
        Ok(config)
    }
}

fn rank_score(rank_by: RankBy, config: &PipelineConfig) -> impl Fn(&CltvRow) -> Option<f64> {
    let sales_column = config
        .horizons
        .iter()
        .max()
        .map(|&h| expected_sales_column(h, config.time_unit));
    move |row: &CltvRow| match rank_by {
        RankBy::Cltv => row.cltv,
        RankBy::Value => row.exp_average_value,
        RankBy::Sales => sales_column
            .as_ref()
            .and_then(|column| row.expected_sales.get(column).copied().flatten()),
    }
}

pub(crate) fn run(arg: &CltvArg) -> anyhow::Result<()> {
    let table = util::read_transactions_file(&arg.input)?;

    // a config file carries its own cutoff unless one is given explicitly
    let cutoff = if arg.config.is_some() && arg.cutoff.is_none() {
        None
    } else {
        Some(util::resolve_cutoff(arg.cutoff, &table)?)
    };
    let config = arg.pipeline_config(cutoff)?;
    tracing::info!(
        cutoff = %config.cutoff,
        time_unit = ?config.time_unit,
        months = config.cltv_months,
        extra_horizons = ?config.cltv_horizons,
        "running CLTV pipeline"
    );

    let report = run_cltv(&table, &config)?;
    tracing::info!(
        customers = report.rows.len(),
        segments = report.segments.len(),
        "CLTV pipeline finished"
    );

    match arg.top {
        Some(n) => {
            let top = report.top_by(n, rank_score(arg.rank_by, &config));
            Output::save_json(&top, arg.output.clone())?;
        }
        None => Output::save_json::<CltvReport>(&report, arg.output.clone())?,
    }
    Ok(())
}
