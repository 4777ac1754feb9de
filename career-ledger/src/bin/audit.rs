//! Offline ledger audit
//!
//! Restores the ledger from a save file and prints its summary as JSON.
//!
//! Host totals that are not given are unknown: a legacy save is then
//! rebalanced to the sums of its own transactions without corrections.

use anyhow::Context;
use career_ledger::{Config, FixedHost, Ledger, SaveStore};
use clap::Parser;
use std::path::PathBuf;

/// Career ledger audit
#[derive(Parser, Debug)]
#[command(
    name = "ledger-audit",
    about = "Restore a career ledger from its save file and print a summary",
    version
)]
struct Args {
    /// Config file; settings come from the environment when omitted
    config: Option<PathBuf>,

    /// Host simulation time used to stamp corrections
    #[arg(long, default_value = "0")]
    time: f64,

    /// Authoritative funds total
    #[arg(long, allow_negative_numbers = true)]
    funds: Option<f64>,

    /// Authoritative science total
    #[arg(long, allow_negative_numbers = true)]
    science: Option<f64>,

    /// Authoritative reputation total
    #[arg(long, allow_negative_numbers = true)]
    reputation: Option<f64>,
}

impl Args {
    /// Unknown totals are NaN so reconciliation ignores them
    fn host(&self) -> FixedHost {
        FixedHost {
            time: self.time,
            funds: self.funds.unwrap_or(f64::NAN),
            science: self.science.unwrap_or(f64::NAN),
            reputation: self.reputation.unwrap_or(f64::NAN),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };

    let store = SaveStore::open(&config)?;
    tracing::info!(path = %store.path().display(), "Auditing career ledger");

    let mut ledger = Ledger::from_config(&config)?;
    if !store.load_into(&mut ledger, &args.host())? {
        tracing::warn!("Save contains no ledger data");
    }

    println!("{}", ledger.summary().to_json_pretty()?);
    Ok(())
}
