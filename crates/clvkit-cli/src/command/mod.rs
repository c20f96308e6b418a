use clap::{Parser, Subcommand};

use self::{cltv::CltvArg, generate_transactions::GenerateTransactionsArg, rfm::RfmArg};

mod cltv;
mod generate_transactions;
mod rfm;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v: debug, -vv: trace); `RUST_LOG` overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// What to run
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit BG/NBD and Gamma-Gamma models and project customer lifetime value
    Cltv(#[clap(flatten)] CltvArg),
    /// Score customers by recency, frequency and spend and assign RFM segments
    Rfm(#[clap(flatten)] RfmArg),
    /// Generate synthetic invoice lines from the BG/NBD and Gamma-Gamma processes
    GenerateTransactions(#[clap(flatten)] GenerateTransactionsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    crate::logging::init(args.verbose)?;
    match args.mode {
        Mode::Cltv(arg) => cltv::run(&arg)?,
        Mode::Rfm(arg) => rfm::run(&arg)?,
        Mode::GenerateTransactions(arg) => generate_transactions::run(&arg)?,
    }
    Ok(())
}
