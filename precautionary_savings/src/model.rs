//! Model session: validated inputs plus the two solvers
//!
//! A [`Model`] checks its parameters once, builds the asset grid, income
//! process and utility table, and then runs value iteration followed by the
//! stationary distribution solver.
//!
//! # Example
//!
//! ```rust,no_run
//! use precautionary_savings::{Model, ModelParams};
//!
//! let model = Model::new(ModelParams::baseline()).unwrap();
//! let solution = model.solve();
//! println!("{}", solution.value_status());
//! ```

use fixed_point::{log_progress, ProgressCallback, Status};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::info;

use crate::bellman::{BellmanOperator, PolicyFunction, ValueFunction};
use crate::distribution::{Distribution, DistributionResult, StationaryDistributionSolver};
use crate::error::Result;
use crate::grid::AssetGrid;
use crate::params::ModelParams;
use crate::process::ProcessModel;
use crate::utility::{ReturnSchedule, UtilityTable};
use crate::value_iteration::{ValueIteration, ValueIterationResult};

/// Optional progress callbacks for the two solver stages
#[derive(Clone, Default)]
pub struct SolveHooks {
    pub value_progress: Option<ProgressCallback>,
    pub distribution_progress: Option<ProgressCallback>,
}

impl SolveHooks {
    /// Log intermediate progress of both stages through `tracing`
    pub fn logging() -> Self {
        SolveHooks {
            value_progress: Some(Arc::new(log_progress("value iteration"))),
            distribution_progress: Some(Arc::new(log_progress("stationary distribution"))),
        }
    }
}

/// Output of a full solve
#[derive(Debug, Clone)]
pub struct Solution {
    pub value_iteration: ValueIterationResult,
    pub distribution: DistributionResult,
}

impl Solution {
    pub fn value(&self) -> &ValueFunction {
        &self.value_iteration.value
    }

    pub fn policy(&self) -> &PolicyFunction {
        &self.value_iteration.policy
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution.distribution
    }

    pub fn value_status(&self) -> Status {
        self.value_iteration.status
    }

    pub fn distribution_status(&self) -> Status {
        self.distribution.status
    }

    /// Both stages met their tolerance
    pub fn is_converged(&self) -> bool {
        self.value_iteration.is_converged() && self.distribution.is_converged()
    }
}

/// Solving session for one parameter set
#[derive(Debug)]
pub struct Model {
    params: ModelParams,
    grid: AssetGrid,
    process: ProcessModel,
    returns: ReturnSchedule,
    utility: UtilityTable,
    pool: Option<ThreadPool>,
}

fn in_pool<R, F>(pool: Option<&ThreadPool>, f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

impl Model {
    /// Validate `params` and build the grid, process and utility table
    pub fn new(params: ModelParams) -> Result<Self> {
        params.validate()?;
        let grid = params.asset_grid()?;
        let process = params.process_model()?;
        let returns = params.returns();

        let pool = match params.num_threads {
            Some(n) => Some(ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };

        let utility = in_pool(pool.as_ref(), || {
            UtilityTable::build(&grid, &process, &returns, params.sigma, params.parallel)
        });

        info!(
            process = %process.kind(),
            states = process.num_states(),
            grid_points = grid.len(),
            a_min = grid.min(),
            a_max = grid.max(),
            grid_step = grid.step(),
            beta = params.beta,
            sigma = params.sigma,
            "model initialised"
        );

        Ok(Model {
            params,
            grid,
            process,
            returns,
            utility,
            pool,
        })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn grid(&self) -> &AssetGrid {
        &self.grid
    }

    pub fn process(&self) -> &ProcessModel {
        &self.process
    }

    pub fn returns(&self) -> &ReturnSchedule {
        &self.returns
    }

    pub fn utility(&self) -> &UtilityTable {
        &self.utility
    }

    pub fn bellman_operator(&self) -> BellmanOperator<'_> {
        BellmanOperator::new(
            &self.utility,
            &self.process,
            self.params.beta,
            self.params.parallel,
        )
    }

    /// Run value iteration from `v = 0`
    pub fn solve_value_function(&self, progress: Option<ProgressCallback>) -> ValueIterationResult {
        in_pool(self.pool.as_ref(), || {
            ValueIteration::new(self.bellman_operator(), self.params.value_iteration.settings())
                .progress_shared(progress)
                .run()
        })
    }

    /// Stationary distribution under `policy`
    pub fn stationary_distribution(
        &self,
        policy: &PolicyFunction,
        progress: Option<ProgressCallback>,
    ) -> DistributionResult {
        in_pool(self.pool.as_ref(), || {
            StationaryDistributionSolver::new(
                policy,
                &self.process,
                self.params.distribution.settings(),
            )
            .parallel(self.params.parallel)
            .progress_shared(progress)
            .run()
        })
    }

    /// Solve without progress callbacks
    pub fn solve(&self) -> Solution {
        self.solve_with(SolveHooks::default())
    }

    /// Value iteration, then the stationary distribution of its policy
    pub fn solve_with(&self, hooks: SolveHooks) -> Solution {
        let value_iteration = self.solve_value_function(hooks.value_progress);
        let distribution =
            self.stationary_distribution(&value_iteration.policy, hooks.distribution_progress);

        Solution {
            value_iteration,
            distribution,
        }
    }
}
