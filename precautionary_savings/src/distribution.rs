//! Stationary distribution over (asset, state)
//!
//! Under a fixed policy the joint distribution evolves as
//!
//! ```text
//! μ'[a1, s1] = Σ_{(a0, s0) : policy[a0, s0] = a1} μ[a0, s0] · P[s0, s1]
//! ```
//!
//! The policy is inverted once into a [`PolicyKernel`] listing, for every
//! destination asset index, the source cells that move there. Each
//! destination cell is then a gather over its sources in a fixed order, so
//! cells can be computed on any number of threads without a shared
//! accumulator and the result does not depend on the thread count.

use std::sync::Arc;

use fixed_point::{sup_norm, FixedPoint, Progress, ProgressCallback, Status};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use crate::bellman::PolicyFunction;
use crate::params::IterationParams;
use crate::process::ProcessModel;

/// Largest tolerated change in total mass across one update
pub const MASS_TOLERANCE: f64 = 1e-9;

/// Probability mass per (asset index, state), shape `Na × Ns`
pub type Distribution = Array2<f64>;

/// Uniform distribution `1 / (Na · Ns)`
pub fn uniform(na: usize, ns: usize) -> Distribution {
    Array2::from_elem((na, ns), 1.0 / (na * ns) as f64)
}

/// Policy inverted by destination asset index
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyKernel {
    /// `sources[a1]` holds every `(a0, s0)` with `policy[a0, s0] = a1`,
    /// ordered by `a0` then `s0`
    sources: Vec<Vec<(usize, usize)>>,
    num_states: usize,
}

impl PolicyKernel {
    pub fn new(policy: &PolicyFunction) -> Self {
        let (na, ns) = policy.dim();
        let mut sources = vec![Vec::new(); na];
        for ((a0, s0), &a1) in policy.indexed_iter() {
            sources[a1].push((a0, s0));
        }
        PolicyKernel {
            sources,
            num_states: ns,
        }
    }

    /// Source cells whose policy chooses asset index `a1`
    pub fn sources(&self, a1: usize) -> &[(usize, usize)] {
        &self.sources[a1]
    }

    /// `(Na, Ns)`
    pub fn dim(&self) -> (usize, usize) {
        (self.sources.len(), self.num_states)
    }
}

/// One update of the distribution under `kernel` and the income chain
///
/// Returns the next distribution, rescaled to unit mass, together with the
/// absolute change in total mass before rescaling.
pub fn push_forward(
    pmf: &Distribution,
    kernel: &PolicyKernel,
    process: &ProcessModel,
    parallel: bool,
) -> (Distribution, f64) {
    let (na, ns) = kernel.dim();
    debug_assert_eq!(pmf.dim(), (na, ns), "distribution shape");
    debug_assert_eq!(process.num_states(), ns, "process size");

    let transition = process.transition();
    let cell = |flat: usize| {
        let a1 = flat / ns;
        let s1 = flat % ns;
        kernel
            .sources(a1)
            .iter()
            .map(|&(a0, s0)| pmf[[a0, s0]] * transition[[s0, s1]])
            .sum::<f64>()
    };

    let masses: Vec<f64> = if parallel {
        (0..na * ns).into_par_iter().map(cell).collect()
    } else {
        (0..na * ns).map(cell).collect()
    };

    let before = pmf.sum();
    let after: f64 = masses.iter().sum();
    let drift = (after - before).abs();
    debug_assert!(
        drift <= MASS_TOLERANCE,
        "distribution update changed total mass by {drift:e}"
    );

    let scale = if after > 0.0 { 1.0 / after } else { 1.0 };
    let next = Array2::from_shape_vec((na, ns), masses.into_iter().map(|m| m * scale).collect())
        .expect("one mass per (asset, state) cell");

    debug_assert!(
        next.iter().all(|&m| m >= 0.0),
        "distribution update produced a negative mass"
    );

    (next, drift)
}

/// Stationary distribution with solver diagnostics
#[derive(Debug, Clone)]
pub struct DistributionResult {
    pub distribution: Distribution,
    pub iterations: usize,
    /// Sup-norm distance between the last two distributions
    pub error: f64,
    pub status: Status,
    /// Largest pre-normalisation change in total mass over the run
    pub max_mass_drift: f64,
}

impl DistributionResult {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}

/// Iterates [`push_forward`] from the uniform distribution to a fixed point
pub struct StationaryDistributionSolver<'a> {
    policy: &'a PolicyFunction,
    process: &'a ProcessModel,
    settings: IterationParams,
    parallel: bool,
    progress_callback: Option<ProgressCallback>,
    initial: Option<Distribution>,
}

impl<'a> StationaryDistributionSolver<'a> {
    pub fn new(
        policy: &'a PolicyFunction,
        process: &'a ProcessModel,
        settings: IterationParams,
    ) -> Self {
        StationaryDistributionSolver {
            policy,
            process,
            settings,
            parallel: true,
            progress_callback: None,
            initial: None,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set progress callback
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn progress_shared(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// Start from `pmf` instead of the uniform distribution
    pub fn initial(mut self, pmf: Distribution) -> Self {
        self.initial = Some(pmf);
        self
    }

    pub fn run(self) -> DistributionResult {
        let kernel = PolicyKernel::new(self.policy);
        let (na, ns) = kernel.dim();
        let start = self.initial.unwrap_or_else(|| uniform(na, ns));

        let process = self.process;
        let parallel = self.parallel;
        let mut max_mass_drift: f64 = 0.0;

        let outcome = FixedPoint::new(
            |pmf: &Distribution| {
                let (next, drift) = push_forward(pmf, &kernel, process, parallel);
                max_mass_drift = max_mass_drift.max(drift);
                next
            },
            |a: &Distribution, b: &Distribution| sup_norm(a, b),
        )
        .tolerance(self.settings.tolerance)
        .max_iterations(self.settings.max_iterations)
        .report_every(self.settings.report_every)
        .label("stationary distribution")
        .progress_shared(self.progress_callback)
        .run(start);

        debug!(max_mass_drift, "distribution mass check");

        DistributionResult {
            distribution: outcome.state,
            iterations: outcome.iterations,
            error: outcome.error,
            status: outcome.status,
            max_mass_drift,
        }
    }
}
