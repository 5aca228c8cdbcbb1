use fixed_point::parallel::{log_completion, ParallelRunner};
use tracing::info;

use crate::analysis::Summary;
use crate::error::Result;
use crate::model::{Model, Solution};
use crate::params::ModelParams;

/// Configuration for a named calibration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Name of the scenario
    pub name: String,
    /// Model parameters
    pub params: ModelParams,
}

impl ScenarioConfig {
    /// Employment risk only (2 states)
    pub fn no_business_cycle(base: &ModelParams) -> Self {
        ScenarioConfig {
            name: "No Business Cycle".to_string(),
            params: ModelParams {
                business_cycle: false,
                custom_process: None,
                ..base.clone()
            },
        }
    }

    /// Employment risk crossed with aggregate good/bad times (4 states)
    pub fn business_cycle(base: &ModelParams) -> Self {
        ScenarioConfig {
            name: "Business Cycle".to_string(),
            params: ModelParams {
                business_cycle: true,
                custom_process: None,
                ..base.clone()
            },
        }
    }

    /// Both income processes on the same preferences and grid
    pub fn both(base: &ModelParams) -> Vec<Self> {
        vec![Self::no_business_cycle(base), Self::business_cycle(base)]
    }
}

/// Result of solving a scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario configuration
    pub config: ScenarioConfig,
    pub solution: Solution,
    pub summary: Summary,
}

impl ScenarioResult {
    /// Print a summary of the scenario result
    pub fn print_summary(&self) {
        println!("\n=== {} ===", self.config.name);
        println!(
            "Value iteration: {} after {} iterations (error {:.2e})",
            self.solution.value_status(),
            self.solution.value_iteration.iterations,
            self.solution.value_iteration.error
        );
        println!(
            "Distribution: {} after {} iterations (error {:.2e})",
            self.solution.distribution_status(),
            self.solution.distribution.iterations,
            self.solution.distribution.error
        );
        self.summary.print_summary();
    }
}

/// Solve a single scenario
pub fn run_scenario(config: ScenarioConfig) -> Result<ScenarioResult> {
    info!(scenario = %config.name, "solving scenario");
    let model = Model::new(config.params.clone())?;
    let solution = model.solve();
    let summary = Summary::from_solution(&model, &solution);

    Ok(ScenarioResult {
        config,
        solution,
        summary,
    })
}

/// Solve scenarios in parallel, one job per scenario, results in input order
///
/// Configuration errors and panics are reported per scenario as strings.
pub fn run_scenarios(
    configs: Vec<ScenarioConfig>,
    num_threads: Option<usize>,
) -> Vec<std::result::Result<ScenarioResult, String>> {
    let total = configs.len();
    let mut runner = ParallelRunner::new(total, |job_id| run_scenario(configs[job_id].clone()))
        .progress(log_completion(1));
    if let Some(n) = num_threads {
        runner = runner.num_threads(n);
    }

    runner
        .run()
        .into_iter()
        .map(|result| result.and_then(|solved| solved.map_err(|e| e.to_string())))
        .collect()
}

/// Print scenario results side by side
pub fn print_comparison(results: &[ScenarioResult]) {
    println!("\n=== Scenario Comparison ===");
    print!("{:<28}", "");
    for result in results {
        print!("{:>20}", result.config.name);
    }
    println!();

    let rows: [(&str, fn(&ScenarioResult) -> String); 8] = [
        ("Mean assets", |r| format!("{:.4}", r.summary.mean_assets)),
        ("Median assets", |r| format!("{:.4}", r.summary.median_assets)),
        ("90th pct assets", |r| format!("{:.4}", r.summary.p90_assets)),
        ("Mean consumption", |r| format!("{:.4}", r.summary.mean_consumption)),
        ("Mass at borrowing limit", |r| {
            format!("{:.4}", r.summary.mass_at_borrowing_limit)
        }),
        ("Asset Gini", |r| match r.summary.asset_gini {
            Some(g) => format!("{:.4}", g),
            None => "n/a".to_string(),
        }),
        ("VI iterations", |r| {
            r.solution.value_iteration.iterations.to_string()
        }),
        ("Converged", |r| r.solution.is_converged().to_string()),
    ];

    for (label, cell) in rows {
        print!("{:<28}", label);
        for result in results {
            print!("{:>20}", cell(result));
        }
        println!();
    }
}
