use std::path::PathBuf;

use chrono::NaiveDate;
use clvkit_models::{
    audience::AudienceQuery,
    pipeline::{RfmConfig, run_rfm},
    rfm::RfmSegment,
};

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct RfmArg {
    /// Transactions JSON file
    input: PathBuf,
    /// Analysis date (YYYY-MM-DD); defaults to two days after the latest purchase
    #[arg(long)]
    cutoff: Option<NaiveDate>,
    /// Only score customers from this country
    #[arg(long)]
    country: Option<String>,
    /// Keep extreme quantities and amounts unchanged
    #[arg(long)]
    no_outlier_suppression: bool,
    /// Segments to select as the audience, comma separated (e.g. `champions,need_attention`)
    #[arg(long, value_delimiter = ',')]
    target_segments: Vec<RfmSegment>,
    /// Interest keywords the audience must match, comma separated
    #[arg(long, value_delimiter = ',')]
    interests: Vec<String>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl RfmArg {
    fn audience(&self) -> Option<AudienceQuery> {
        if self.target_segments.is_empty() && self.interests.is_empty() {
            return None;
        }
        Some(AudienceQuery {
            segments: self.target_segments.clone(),
            interest_keywords: self.interests.clone(),
        })
    }
}

pub(crate) fn run(arg: &RfmArg) -> anyhow::Result<()> {
    let table = util::read_transactions_file(&arg.input)?;
    let config = RfmConfig {
        suppress_outliers: !arg.no_outlier_suppression,
        country: arg.country.clone(),
        audience: arg.audience(),
        ..RfmConfig::new(util::resolve_cutoff(arg.cutoff, &table)?)
    };
    tracing::info!(cutoff = %config.cutoff, "running RFM scoring");

    let report = run_rfm(&table, &config)?;
    tracing::info!(
        customers = report.rows.len(),
        segments = report.segments.len(),
        "RFM scoring finished"
    );
    if let Some(audience) = &report.audience {
        tracing::info!(selected = audience.len(), "selected audience");
    }

    Output::save_json(&report, arg.output.clone())?;
    Ok(())
}
