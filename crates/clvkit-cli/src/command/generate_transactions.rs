use std::path::PathBuf;

use chrono::NaiveDate;
use clvkit_models::{
    bgnbd::BetaGeoParams,
    customer::TimeUnit,
    gamma_gamma::GammaGammaParams,
    simulate::{SimulationConfig, simulate_invoices},
    transaction::TransactionTable,
};

use crate::util::Output;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateTransactionsArg {
    /// Number of customers to simulate
    #[arg(long, default_value_t = 1000)]
    customers: usize,
    /// BG/NBD shape of the purchase rate distribution
    #[arg(long, default_value_t = 0.8)]
    r: f64,
    /// BG/NBD scale of the purchase rate distribution
    #[arg(long, default_value_t = 4.0)]
    alpha: f64,
    /// BG/NBD dropout parameter a
    #[arg(long, default_value_t = 0.5)]
    a: f64,
    /// BG/NBD dropout parameter b
    #[arg(long, default_value_t = 3.0)]
    b: f64,
    /// Gamma-Gamma shape of transaction values
    #[arg(long, default_value_t = 6.0)]
    p: f64,
    /// Gamma-Gamma shape of the customer value scale
    #[arg(long, default_value_t = 4.0)]
    q: f64,
    /// Gamma-Gamma rate of the customer value scale
    #[arg(long, default_value_t = 15.0)]
    v: f64,
    /// Earliest first purchase date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// End of the simulated period (YYYY-MM-DD)
    #[arg(long)]
    cutoff: NaiveDate,
    /// Unit the BG/NBD parameters are expressed in (day, week, month)
    #[arg(long, default_value = "week")]
    time_unit: TimeUnit,
    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Country written on every line
    #[arg(long)]
    country: Option<String>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GenerateTransactionsArg) -> anyhow::Result<()> {
    let config = SimulationConfig {
        customers: arg.customers,
        frequency: BetaGeoParams {
            r: arg.r,
            alpha: arg.alpha,
            a: arg.a,
            b: arg.b,
        },
        monetary: GammaGammaParams {
            p: arg.p,
            q: arg.q,
            v: arg.v,
        },
        start: arg.start,
        cutoff: arg.cutoff,
        time_unit: arg.time_unit,
        seed: arg.seed,
        country: arg.country.clone(),
    };
    let lines = simulate_invoices(&config)?;
    tracing::info!(
        customers = arg.customers,
        lines = lines.len(),
        seed = arg.seed,
        "generated transactions"
    );

    Output::save_json(&TransactionTable::Invoices(lines), arg.output.clone())?;
    Ok(())
}
