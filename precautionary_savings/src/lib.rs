//! Precautionary savings under employment and business-cycle risk
//!
//! A household chooses next-period assets on a discrete grid to maximise
//! expected discounted CRRA utility, facing a Markov income process
//! (employed/unemployed, optionally crossed with aggregate good/bad times).
//! The model is solved in two stages:
//!
//! 1. value function iteration with an exact grid-search Bellman operator,
//! 2. the stationary distribution over (asset, state) under the resulting
//!    policy.
//!
//! Both stages are driven by [`fixed_point::FixedPoint`] and report
//! non-convergence through [`fixed_point::Status`] rather than as an error.

pub mod analysis;
pub mod bellman;
pub mod distribution;
pub mod error;
pub mod grid;
pub mod model;
pub mod output;
pub mod params;
pub mod process;
pub mod scenarios;
pub mod utility;
pub mod value_iteration;

pub use bellman::{BellmanOperator, PolicyFunction, ValueFunction};
pub use distribution::{Distribution, DistributionResult, PolicyKernel};
pub use error::{ConfigError, ModelError, Result};
pub use fixed_point::Status;
pub use grid::AssetGrid;
pub use model::{Model, Solution, SolveHooks};
pub use params::ModelParams;
pub use process::{ProcessKind, ProcessModel};
pub use utility::{BorrowingRule, ReturnSchedule, UtilityTable};
pub use value_iteration::{ValueIteration, ValueIterationResult};
