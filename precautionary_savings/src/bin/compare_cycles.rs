//! Compare savings behaviour with and without aggregate business cycles.
//!
//! Solves the 2-state and 4-state versions of one calibration in parallel and
//! prints their statistics side by side.
//!
//! Usage:
//!   cargo run --release --bin compare_cycles -- --config configs/baseline.toml --threads 2

use clap::Parser;
use precautionary_savings::scenarios::{print_comparison, run_scenarios, ScenarioConfig};
use precautionary_savings::{ModelParams, Result};
use std::path::PathBuf;
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "compare_cycles")]
#[command(version)]
#[command(about = "Solve the model with and without business cycles and compare")]
struct Cli {
    /// Path to a TOML parameter file (baseline calibration when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Threads for running the scenarios (rayon's global pool when omitted)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn run(cli: Cli) -> Result<bool> {
    let base = match &cli.config {
        Some(path) => ModelParams::from_file(path)?,
        None => ModelParams::baseline(),
    };
    base.validate()?;

    let mut solved = Vec::new();
    for (i, result) in run_scenarios(ScenarioConfig::both(&base), cli.threads)
        .into_iter()
        .enumerate()
    {
        match result {
            Ok(result) => solved.push(result),
            Err(e) => warn!(scenario = i, error = %e, "scenario failed"),
        }
    }

    for result in &solved {
        result.print_summary();
    }
    print_comparison(&solved);

    Ok(solved.len() == 2)
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
