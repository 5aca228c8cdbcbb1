//! Value function iteration
//!
//! Repeats the Bellman operator from `v = 0` until successive value functions
//! are within tolerance in the sup norm or the iteration cap is reached.

use fixed_point::{sup_norm, FixedPoint, Progress, ProgressCallback, Status};
use std::sync::Arc;

use crate::bellman::{BellmanOperator, BellmanUpdate, PolicyFunction, ValueFunction};
use crate::params::IterationParams;

/// Converged (or best-effort) value function and policy
#[derive(Debug, Clone)]
pub struct ValueIterationResult {
    pub value: ValueFunction,
    pub policy: PolicyFunction,
    pub iterations: usize,
    /// Sup-norm distance between the last two value functions
    pub error: f64,
    pub status: Status,
}

impl ValueIterationResult {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}

/// Value iteration driver
///
/// # Example
///
/// ```rust,ignore
/// let result = ValueIteration::new(operator, params.value_iteration.settings())
///     .progress(fixed_point::log_progress("value iteration"))
///     .run();
/// ```
pub struct ValueIteration<'a> {
    operator: BellmanOperator<'a>,
    settings: IterationParams,
    progress_callback: Option<ProgressCallback>,
    initial: Option<ValueFunction>,
}

impl<'a> ValueIteration<'a> {
    pub fn new(operator: BellmanOperator<'a>, settings: IterationParams) -> Self {
        ValueIteration {
            operator,
            settings,
            progress_callback: None,
            initial: None,
        }
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

    /// Start from `value` instead of zero
    pub fn initial_value(mut self, value: ValueFunction) -> Self {
        self.initial = Some(value);
        self
    }

    pub fn run(self) -> ValueIterationResult {
        let (na, ns) = self.operator.dim();
        let mut start = BellmanUpdate::zeros(na, ns);
        if let Some(value) = self.initial {
            debug_assert_eq!(value.dim(), (na, ns), "initial value shape");
            start.value = value;
        }

        let operator = self.operator;
        let outcome = FixedPoint::new(
            |current: &BellmanUpdate| operator.apply(&current.value),
            |a: &BellmanUpdate, b: &BellmanUpdate| sup_norm(&a.value, &b.value),
        )
        .tolerance(self.settings.tolerance)
        .max_iterations(self.settings.max_iterations)
        .report_every(self.settings.report_every)
        .label("value iteration")
        .progress_shared(self.progress_callback)
        .run(start);

        ValueIterationResult {
            value: outcome.state.value,
            policy: outcome.state.policy,
            iterations: outcome.iterations,
            error: outcome.error,
            status: outcome.status,
        }
    }
}
