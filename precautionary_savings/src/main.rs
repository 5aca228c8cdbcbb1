//! Solve one calibration of the precautionary savings model.
//!
//! Usage:
//!   cargo run --release -- --config configs/baseline.toml --output output/baseline

use clap::Parser;
use precautionary_savings::analysis::Summary;
use precautionary_savings::output::SolutionOutput;
use precautionary_savings::{Model, ModelParams, Result, SolveHooks};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "precautionary_savings")]
#[command(version)]
#[command(about = "Value function iteration and stationary distribution for a precautionary savings model")]
struct Cli {
    /// Path to a TOML parameter file (baseline calibration when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the 4-state business-cycle income process
    #[arg(short, long)]
    business_cycle: bool,

    /// Directory for CSV and JSON output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run every sweep on a single thread
    #[arg(long)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn run(cli: Cli) -> Result<()> {
    let mut params = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading parameters");
            ModelParams::from_file(path)?
        }
        None => ModelParams::baseline(),
    };
    if cli.business_cycle {
        params.business_cycle = true;
    }
    if cli.sequential {
        params.parallel = false;
    }

    let start = Instant::now();
    let model = Model::new(params)?;
    let solution = model.solve_with(SolveHooks::logging());
    info!(elapsed_secs = start.elapsed().as_secs_f64(), "solve finished");

    println!("========================================");
    println!("Precautionary Savings");
    println!("========================================");
    println!(
        "Value iteration: {} ({} iterations, error {:.2e})",
        solution.value_status(),
        solution.value_iteration.iterations,
        solution.value_iteration.error
    );
    println!(
        "Distribution:    {} ({} iterations, error {:.2e}, max mass drift {:.2e})",
        solution.distribution_status(),
        solution.distribution.iterations,
        solution.distribution.error,
        solution.distribution.max_mass_drift
    );

    Summary::from_solution(&model, &solution).print_summary();

    if let Some(dir) = &cli.output {
        SolutionOutput::from_solution(&model, &solution).write_all(dir)?;
        info!(dir = %dir.display(), "wrote output");
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}
