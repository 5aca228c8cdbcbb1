//! Bellman operator
//!
//! One application maps a value function `v` to
//!
//! ```text
//! v_new[a0, s] = max_a1 { u[a0, s, a1] + β Σ_s' P[s, s'] v[a1, s'] }
//! ```
//!
//! together with the maximising `a1`. The expectation term does not depend
//! on `a0`, so it is computed once per application as the matrix product
//! `EV = P · vᵀ` (shape `Ns × Na`). The maximisation is an exact grid search
//! over budget-feasible choices; ties go to the lowest index. Only when no
//! choice is feasible does the scan rank the sentinel-valued entries.

use ndarray::{s, Array2};
use rayon::prelude::*;

use crate::process::ProcessModel;
use crate::utility::UtilityTable;

/// Value per (asset index, state), shape `Na × Ns`
pub type ValueFunction = Array2<f64>;

/// Chosen next-period asset index per (asset index, state), shape `Na × Ns`
pub type PolicyFunction = Array2<usize>;

/// Output of one Bellman application
#[derive(Debug, Clone, PartialEq)]
pub struct BellmanUpdate {
    pub value: ValueFunction,
    pub policy: PolicyFunction,
}

impl BellmanUpdate {
    /// Zero value function with every cell choosing index 0
    pub fn zeros(na: usize, ns: usize) -> Self {
        BellmanUpdate {
            value: Array2::zeros((na, ns)),
            policy: Array2::zeros((na, ns)),
        }
    }
}

/// Expected next-period value `EV[s, a1] = Σ_s' P[s, s'] v[a1, s']`
pub fn expected_continuation(value: &ValueFunction, process: &ProcessModel) -> Array2<f64> {
    process.transition().dot(&value.t())
}

/// Bellman operator over a fixed utility table
#[derive(Debug, Clone, Copy)]
pub struct BellmanOperator<'a> {
    utility: &'a UtilityTable,
    process: &'a ProcessModel,
    beta: f64,
    parallel: bool,
}

impl<'a> BellmanOperator<'a> {
    pub fn new(
        utility: &'a UtilityTable,
        process: &'a ProcessModel,
        beta: f64,
        parallel: bool,
    ) -> Self {
        BellmanOperator {
            utility,
            process,
            beta,
            parallel,
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// `(Na, Ns)`
    pub fn dim(&self) -> (usize, usize) {
        let (na, ns, _) = self.utility.dim();
        (na, ns)
    }

    /// Apply the operator once, producing a fresh value and policy
    pub fn apply(&self, value: &ValueFunction) -> BellmanUpdate {
        let (na, ns) = self.dim();
        debug_assert_eq!(value.dim(), (na, ns), "value function shape");

        let continuation = expected_continuation(value, self.process);
        let table = self.utility.values();
        let mask = self.utility.feasible();
        let beta = self.beta;

        let cell = |flat: usize| {
            let a0 = flat / ns;
            let state = flat % ns;
            let utilities = table.slice(s![a0, state, ..]);
            let feasible = mask.slice(s![a0, state, ..]);
            let expected = continuation.row(state);

            let mut best = f64::NEG_INFINITY;
            let mut best_feasible = false;
            let mut best_index = 0;
            for (a1, ((&u, &ok), &ev)) in utilities
                .iter()
                .zip(feasible.iter())
                .zip(expected.iter())
                .enumerate()
            {
                let candidate = u + beta * ev;
                // A feasible choice beats any infeasible one; strict comparison
                // keeps the first maximiser within a class
                let better = match (ok, best_feasible) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => candidate > best,
                };
                if better {
                    best = candidate;
                    best_feasible = ok;
                    best_index = a1;
                }
            }
            (best, best_index)
        };

        let (values, choices): (Vec<f64>, Vec<usize>) = if self.parallel {
            (0..na * ns).into_par_iter().map(cell).unzip()
        } else {
            (0..na * ns).map(cell).unzip()
        };

        debug_assert!(
            values.iter().all(|v| v.is_finite()),
            "Bellman update produced a non-finite value"
        );

        BellmanUpdate {
            value: Array2::from_shape_vec((na, ns), values)
                .expect("one value per (asset, state) cell"),
            policy: Array2::from_shape_vec((na, ns), choices)
                .expect("one choice per (asset, state) cell"),
        }
    }
}
