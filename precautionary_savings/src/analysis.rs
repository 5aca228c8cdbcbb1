use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::bellman::PolicyFunction;
use crate::distribution::Distribution;
use crate::grid::AssetGrid;
use crate::model::{Model, Solution};
use crate::process::ProcessModel;
use crate::utility::ReturnSchedule;

/// Next-period asset levels chosen by the policy
pub fn policy_assets(grid: &AssetGrid, policy: &PolicyFunction) -> Array2<f64> {
    policy.mapv(|a1| grid.value(a1))
}

/// Consumption implied by the policy through the budget constraint
pub fn consumption_policy(
    grid: &AssetGrid,
    process: &ProcessModel,
    returns: &ReturnSchedule,
    policy: &PolicyFunction,
) -> Array2<f64> {
    Array2::from_shape_fn(policy.dim(), |(a0, s)| {
        returns.consumption(
            grid.value(a0),
            process.income_in(s),
            grid.value(policy[[a0, s]]),
        )
    })
}

/// Mass at each asset level, summed over states
pub fn asset_marginal(distribution: &Distribution) -> Array1<f64> {
    distribution.sum_axis(Axis(1))
}

/// Mass in each exogenous state, summed over assets
pub fn state_marginal(distribution: &Distribution) -> Array1<f64> {
    distribution.sum_axis(Axis(0))
}

/// Mean of a per-cell quantity under the distribution
pub fn expectation(values: &Array2<f64>, distribution: &Distribution) -> f64 {
    (values * distribution).sum()
}

/// Mean asset holdings
pub fn mean_assets(grid: &AssetGrid, distribution: &Distribution) -> f64 {
    asset_marginal(distribution).dot(grid.values())
}

/// Mean asset holdings within each state
///
/// States with no mass report 0.
pub fn mean_assets_by_state(grid: &AssetGrid, distribution: &Distribution) -> Array1<f64> {
    let weighted = distribution.t().dot(grid.values());
    let mass = state_marginal(distribution);
    Array1::from_shape_fn(mass.len(), |s| {
        if mass[s] > 0.0 {
            weighted[s] / mass[s]
        } else {
            0.0
        }
    })
}

/// Smallest grid level at which the cumulative asset mass reaches `q`
pub fn quantile(grid: &AssetGrid, distribution: &Distribution, q: f64) -> f64 {
    let marginal = asset_marginal(distribution);
    let total = marginal.sum();
    let target = q.clamp(0.0, 1.0) * total;

    let mut cumulative = 0.0;
    for (i, &mass) in marginal.iter().enumerate() {
        cumulative += mass;
        if cumulative >= target && mass > 0.0 {
            return grid.value(i);
        }
    }
    grid.max()
}

/// Gini coefficient of asset holdings
///
/// Computed from the Lorenz curve of the discrete asset marginal. Undefined
/// (None) when mean holdings are not positive.
pub fn gini(grid: &AssetGrid, distribution: &Distribution) -> Option<f64> {
    let marginal = asset_marginal(distribution);
    let total_mass = marginal.sum();
    let total_assets = mean_assets(grid, distribution);
    if total_mass <= 0.0 || total_assets <= 0.0 {
        return None;
    }

    // Area under the Lorenz curve by trapezoids, grid values already sorted
    let mut area = 0.0;
    let mut share_before = 0.0;
    for (i, &mass) in marginal.iter().enumerate() {
        let share_after = share_before + mass * grid.value(i) / total_assets;
        area += (mass / total_mass) * (share_before + share_after) / 2.0;
        share_before = share_after;
    }
    Some(1.0 - 2.0 * area)
}

/// Headline statistics of a solved model
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub process: String,
    /// Model periods per year, for reading per-period quantities
    pub periods_per_year: f64,
    pub state_labels: Vec<String>,
    pub mean_assets: f64,
    pub median_assets: f64,
    pub p90_assets: f64,
    pub mean_consumption: f64,
    /// Mass at the lowest grid point
    pub mass_at_borrowing_limit: f64,
    /// Mass at the highest grid point; large values mean the grid is too short
    pub mass_at_grid_top: f64,
    pub asset_gini: Option<f64>,
    pub state_marginal: Vec<f64>,
    pub mean_assets_by_state: Vec<f64>,
}

impl Summary {
    pub fn from_solution(model: &Model, solution: &Solution) -> Self {
        let grid = model.grid();
        let process = model.process();
        let distribution = solution.distribution();
        let marginal = asset_marginal(distribution);

        let consumption =
            consumption_policy(grid, process, model.returns(), solution.policy());

        Summary {
            process: process.kind().to_string(),
            periods_per_year: model.params().periods_per_year(),
            state_labels: process.labels().to_vec(),
            mean_assets: mean_assets(grid, distribution),
            median_assets: quantile(grid, distribution, 0.5),
            p90_assets: quantile(grid, distribution, 0.9),
            mean_consumption: expectation(&consumption, distribution),
            mass_at_borrowing_limit: marginal[0],
            mass_at_grid_top: marginal[marginal.len() - 1],
            asset_gini: gini(grid, distribution),
            state_marginal: state_marginal(distribution).to_vec(),
            mean_assets_by_state: mean_assets_by_state(grid, distribution).to_vec(),
        }
    }

    /// Print a summary of the solution
    pub fn print_summary(&self) {
        println!("\n=== {} ===", self.process);
        println!("Periods per year: {:.2}", self.periods_per_year);
        println!(
            "Assets: mean={:.4}, median={:.4}, p90={:.4}",
            self.mean_assets, self.median_assets, self.p90_assets
        );
        println!("Consumption: mean={:.4}", self.mean_consumption);
        match self.asset_gini {
            Some(g) => println!("Asset Gini: {:.4}", g),
            None => println!("Asset Gini: n/a"),
        }
        println!(
            "Mass at borrowing limit: {:.4}, at grid top: {:.2e}",
            self.mass_at_borrowing_limit, self.mass_at_grid_top
        );
        for (i, label) in self.state_labels.iter().enumerate() {
            println!(
                "  {:<16} mass={:.4}  mean assets={:.4}",
                label, self.state_marginal[i], self.mean_assets_by_state[i]
            );
        }
    }
}
