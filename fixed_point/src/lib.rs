//! Fixed-point iteration engine
//!
//! Drives a map `x ← T(x)` until successive iterates are within a tolerance
//! or an iteration cap is reached. Both outcomes are normal terminations:
//! hitting the cap is reported through [`Status::MaxIterExceeded`] alongside
//! the last iterate, and the caller decides what to do with it.
//!
//! # Example
//!
//! ```rust
//! use fixed_point::{FixedPoint, Status};
//!
//! // Babylonian iteration for sqrt(2)
//! let outcome = FixedPoint::new(|x: &f64| 0.5 * (x + 2.0 / x), |a: &f64, b: &f64| (a - b).abs())
//!     .tolerance(1e-12)
//!     .max_iterations(100)
//!     .run(1.0);
//!
//! assert_eq!(outcome.status, Status::Converged);
//! assert!((outcome.state - 2f64.sqrt()).abs() < 1e-12);
//! ```
//!
//! # Progress reporting
//!
//! A callback registered with [`FixedPoint::progress`] receives a [`Progress`]
//! every `report_every` iterations and once more on termination. The engine
//! itself only emits `tracing` events, so a solver stays silent unless a
//! subscriber or callback is installed.

pub mod parallel;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Terminal state of an iteration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Successive iterates came within tolerance
    Converged,
    /// Iteration cap reached before the tolerance was met
    MaxIterExceeded,
}

impl Status {
    pub fn is_converged(&self) -> bool {
        matches!(self, Status::Converged)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Converged => write!(f, "Converged"),
            Status::MaxIterExceeded => write!(f, "Max Iterations Exceeded"),
        }
    }
}

/// Snapshot passed to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Number of completed iterations
    pub iteration: usize,
    /// Distance between the last two iterates
    pub error: f64,
    /// True for the final report of a run
    pub finished: bool,
}

/// Result of running an iteration to termination
#[derive(Debug, Clone)]
pub struct Outcome<S> {
    /// Last iterate (the fixed point when converged)
    pub state: S,
    /// Number of applications of the map
    pub iterations: usize,
    /// Distance between the last two iterates
    pub error: f64,
    pub status: Status,
}

impl<S> Outcome<S> {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Replace the state, keeping the diagnostics
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Outcome<T> {
        Outcome {
            state: f(self.state),
            iterations: self.iterations,
            error: self.error,
            status: self.status,
        }
    }
}

/// Shared progress callback type
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Iterates a map until convergence or an iteration cap
///
/// Generic over:
/// - `S`: Iterate type
/// - `F`: The map, `&S -> S` (each application produces a fresh iterate)
/// - `D`: Distance between successive iterates
pub struct FixedPoint<S, F, D>
where
    F: FnMut(&S) -> S,
    D: Fn(&S, &S) -> f64,
{
    step: F,
    distance: D,
    tolerance: f64,
    max_iterations: usize,
    report_every: usize,
    label: String,
    progress_callback: Option<ProgressCallback>,
    _state: std::marker::PhantomData<fn() -> S>,
}

impl<S, F, D> FixedPoint<S, F, D>
where
    F: FnMut(&S) -> S,
    D: Fn(&S, &S) -> f64,
{
    /// Create a driver with tolerance 1e-8, cap 1000 and no progress reporting
    pub fn new(step: F, distance: D) -> Self {
        FixedPoint {
            step,
            distance,
            tolerance: 1e-8,
            max_iterations: 1000,
            report_every: usize::MAX,
            label: "fixed point".to_string(),
            progress_callback: None,
            _state: std::marker::PhantomData,
        }
    }

    /// Stop once the distance between successive iterates is at most `tol`
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Stop after `n` applications of the map
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Report progress every `n` iterations (0 is treated as 1)
    pub fn report_every(mut self, n: usize) -> Self {
        self.report_every = n.max(1);
        self
    }

    /// Name used in log events
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
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

    /// Set an already shared progress callback (or clear it with `None`)
    pub fn progress_shared(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    fn report(&self, progress: Progress) {
        debug!(
            target: "fixed_point",
            label = %self.label,
            iteration = progress.iteration,
            error = progress.error,
            "iteration progress"
        );
        if let Some(ref callback) = self.progress_callback {
            callback(&progress);
        }
    }

    /// Iterate from `initial` until convergence or the cap
    pub fn run(mut self, initial: S) -> Outcome<S> {
        let mut state = initial;
        let mut error = f64::INFINITY;
        let mut iterations = 0;

        let status = loop {
            if iterations >= self.max_iterations {
                break Status::MaxIterExceeded;
            }

            let next = (self.step)(&state);
            error = (self.distance)(&state, &next);
            iterations += 1;
            state = next;

            if error <= self.tolerance {
                break Status::Converged;
            }

            if iterations % self.report_every == 0 && iterations < self.max_iterations {
                self.report(Progress {
                    iteration: iterations,
                    error,
                    finished: false,
                });
            }
        };

        self.report(Progress {
            iteration: iterations,
            error,
            finished: true,
        });

        match status {
            Status::Converged => info!(
                label = %self.label,
                iterations,
                error,
                "converged"
            ),
            Status::MaxIterExceeded => warn!(
                label = %self.label,
                iterations,
                error,
                tolerance = self.tolerance,
                "iteration cap reached before convergence"
            ),
        }

        Outcome {
            state,
            iterations,
            error,
            status,
        }
    }
}

/// Largest absolute element-wise difference between two sequences
///
/// NaN anywhere in the differences makes the result NaN, so a diverging
/// iterate can never pass a tolerance check.
pub fn sup_norm<'a, A, B>(a: A, b: B) -> f64
where
    A: IntoIterator<Item = &'a f64>,
    B: IntoIterator<Item = &'a f64>,
{
    a.into_iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, |acc: f64, d| if d.is_nan() || d > acc { d } else { acc })
}

/// Pre-built progress reporter that logs through `tracing`
///
/// Intermediate reports go out at INFO so that a default subscriber shows
/// them; the final report is left to the driver's own termination event.
pub fn log_progress(label: impl Into<String>) -> impl Fn(&Progress) + Send + Sync {
    let label = label.into();
    move |progress: &Progress| {
        if !progress.finished {
            info!(
                label = %label,
                iteration = progress.iteration,
                error = progress.error,
                "still iterating"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn abs_diff(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    #[test]
    fn converges_to_sqrt_two() {
        let outcome = FixedPoint::new(|x: &f64| 0.5 * (x + 2.0 / x), abs_diff)
            .tolerance(1e-12)
            .run(1.0);

        assert_eq!(outcome.status, Status::Converged);
        assert!((outcome.state - 2f64.sqrt()).abs() < 1e-12);
        assert!(outcome.error <= 1e-12);
        assert!(outcome.iterations < 10);
    }

    #[test]
    fn cap_is_reported_not_raised() {
        let outcome = FixedPoint::new(|x: &f64| x + 1.0, abs_diff)
            .max_iterations(10)
            .run(0.0);

        assert_eq!(outcome.status, Status::MaxIterExceeded);
        assert_eq!(outcome.iterations, 10);
        assert_eq!(outcome.state, 10.0);
        assert_eq!(outcome.error, 1.0);
    }

    #[test]
    fn zero_cap_returns_initial_state() {
        let outcome = FixedPoint::new(|x: &f64| x + 1.0, abs_diff)
            .max_iterations(0)
            .run(3.0);

        assert_eq!(outcome.status, Status::MaxIterExceeded);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.state, 3.0);
        assert!(outcome.error.is_infinite());
    }

    #[test]
    fn contraction_error_shrinks_geometrically() {
        // x ← 0.5 x + 1 has fixed point 2 and halves the error each step
        let outcome = FixedPoint::new(|x: &f64| 0.5 * x + 1.0, abs_diff)
            .tolerance(1e-9)
            .max_iterations(200)
            .run(0.0);

        assert!(outcome.is_converged());
        assert!((outcome.state - 2.0).abs() < 1e-8);
        assert!(outcome.iterations > 25 && outcome.iterations < 40);
    }

    #[test]
    fn progress_callback_cadence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        FixedPoint::new(|x: &f64| x + 1.0, abs_diff)
            .max_iterations(10)
            .report_every(3)
            .progress(move |p| seen_clone.lock().unwrap().push((p.iteration, p.finished)))
            .run(0.0);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(3, false), (6, false), (9, false), (10, true)]);
    }

    #[test]
    fn final_report_on_convergence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        FixedPoint::new(|_: &f64| 1.0, abs_diff)
            .progress(move |p| seen_clone.lock().unwrap().push(*p))
            .run(1.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].finished);
        assert_eq!(seen[0].iteration, 1);
        assert_eq!(seen[0].error, 0.0);
    }

    #[test]
    fn sup_norm_takes_largest_gap() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.5, 2.0, 0.0];
        assert_eq!(sup_norm(&a, &b), 3.0);
        assert_eq!(sup_norm(&a, &a), 0.0);
    }

    #[test]
    fn sup_norm_propagates_nan() {
        let a = [f64::NAN, 1.0];
        let b = [0.0, 5.0];
        assert!(sup_norm(&a, &b).is_nan());

        let a = [5.0, f64::NAN];
        let b = [0.0, 0.0];
        assert!(sup_norm(&a, &b).is_nan());
    }

    #[test]
    fn nan_iterates_never_converge() {
        let outcome = FixedPoint::new(|_: &f64| f64::NAN, abs_diff)
            .max_iterations(5)
            .run(0.0);

        assert_eq!(outcome.status, Status::MaxIterExceeded);
        assert_eq!(outcome.iterations, 5);
    }

    #[test]
    fn outcome_map_keeps_diagnostics() {
        let outcome = FixedPoint::new(|x: &f64| x + 1.0, abs_diff)
            .max_iterations(4)
            .run(0.0)
            .map(|x| x as usize);

        assert_eq!(outcome.state, 4);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.status, Status::MaxIterExceeded);
    }

    #[test]
    fn log_progress_runs_without_subscriber() {
        let reporter = log_progress("test");
        reporter(&Progress {
            iteration: 1,
            error: 0.5,
            finished: false,
        });
        reporter(&Progress {
            iteration: 2,
            error: 0.1,
            finished: true,
        });
    }
}
