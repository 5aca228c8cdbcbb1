//! Export of solved models
//!
//! Writes the policy, value function and stationary distribution as long-form
//! CSV tables (one row per asset/state cell) and a JSON summary with the
//! configuration, solver diagnostics and headline statistics, for analysis in
//! Python (pandas, matplotlib).

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::analysis::{consumption_policy, Summary};
use crate::error::{ModelError, Result};
use crate::model::{Model, Solution};
use crate::params::ModelParams;

/// Metadata for reproducibility
#[derive(Debug, Clone, Serialize)]
pub struct SolutionMetadata {
    pub config: ModelParams,
    pub timestamp: String,
    pub git_commit: Option<String>,
}

/// Diagnostics of one solver stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub status: String,
    pub converged: bool,
    pub iterations: usize,
    pub error: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mass_drift: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    pub value_iteration: StageReport,
    pub distribution: StageReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyRecord {
    pub asset_index: usize,
    pub asset: f64,
    pub state: String,
    pub next_asset_index: usize,
    pub next_asset: f64,
    pub consumption: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueRecord {
    pub asset_index: usize,
    pub asset: f64,
    pub state: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionRecord {
    pub asset_index: usize,
    pub asset: f64,
    pub state: String,
    pub mass: f64,
}

/// Everything written for one solved model
#[derive(Debug, Clone, Serialize)]
pub struct SolutionOutput {
    pub metadata: SolutionMetadata,
    pub convergence: ConvergenceReport,
    pub summary: Summary,
    #[serde(skip)]
    pub policy: Vec<PolicyRecord>,
    #[serde(skip)]
    pub value: Vec<ValueRecord>,
    #[serde(skip)]
    pub distribution: Vec<DistributionRecord>,
}

fn git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

impl SolutionOutput {
    pub fn from_solution(model: &Model, solution: &Solution) -> Self {
        let grid = model.grid();
        let process = model.process();
        let consumption = consumption_policy(grid, process, model.returns(), solution.policy());

        let (na, ns) = solution.policy().dim();
        let cells = || (0..na).flat_map(move |a| (0..ns).map(move |s| (a, s)));

        let policy = cells()
            .map(|(a, s)| {
                let next = solution.policy()[[a, s]];
                PolicyRecord {
                    asset_index: a,
                    asset: grid.value(a),
                    state: process.label(s).to_string(),
                    next_asset_index: next,
                    next_asset: grid.value(next),
                    consumption: consumption[[a, s]],
                }
            })
            .collect();

        let value = cells()
            .map(|(a, s)| ValueRecord {
                asset_index: a,
                asset: grid.value(a),
                state: process.label(s).to_string(),
                value: solution.value()[[a, s]],
            })
            .collect();

        let distribution = cells()
            .map(|(a, s)| DistributionRecord {
                asset_index: a,
                asset: grid.value(a),
                state: process.label(s).to_string(),
                mass: solution.distribution()[[a, s]],
            })
            .collect();

        let vi = &solution.value_iteration;
        let dist = &solution.distribution;

        SolutionOutput {
            metadata: SolutionMetadata {
                config: model.params().clone(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                git_commit: git_commit(),
            },
            convergence: ConvergenceReport {
                value_iteration: StageReport {
                    status: vi.status.to_string(),
                    converged: vi.is_converged(),
                    iterations: vi.iterations,
                    error: vi.error,
                    max_mass_drift: None,
                },
                distribution: StageReport {
                    status: dist.status.to_string(),
                    converged: dist.is_converged(),
                    iterations: dist.iterations,
                    error: dist.error,
                    max_mass_drift: Some(dist.max_mass_drift),
                },
            },
            summary: Summary::from_solution(model, solution),
            policy,
            value,
            distribution,
        }
    }

    fn write_csv<T: Serialize, P: AsRef<Path>>(rows: &[T], path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()
            .map_err(|e| ModelError::io("flushing CSV writer", e))?;
        Ok(())
    }

    /// Write the policy table to CSV
    pub fn write_policy_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Self::write_csv(&self.policy, path)
    }

    /// Write the value function to CSV
    pub fn write_value_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Self::write_csv(&self.value, path)
    }

    /// Write the stationary distribution to CSV
    pub fn write_distribution_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Self::write_csv(&self.distribution, path)
    }

    /// Write summary JSON with metadata, convergence and statistics
    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| ModelError::io(format!("writing {}", path.display()), e))
    }

    /// Write all outputs to a directory
    ///
    /// Creates:
    /// - policy.csv
    /// - value.csv
    /// - distribution.csv
    /// - summary.json
    pub fn write_all<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| ModelError::io(format!("creating {}", dir.display()), e))?;

        self.write_policy_csv(dir.join("policy.csv"))?;
        self.write_value_csv(dir.join("value.csv"))?;
        self.write_distribution_csv(dir.join("distribution.csv"))?;
        self.write_summary_json(dir.join("summary.json"))?;

        Ok(())
    }
}
