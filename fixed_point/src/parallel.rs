//! Parallel execution of independent solves
//!
//! Runs a batch of independent jobs (calibrations, parameter sweeps) on
//! rayon's pool and returns their results in job order.
//!
//! # Example
//!
//! ```rust
//! use fixed_point::parallel::ParallelRunner;
//!
//! let results = ParallelRunner::new(8, |job_id| job_id * job_id)
//!     .num_threads(2)
//!     .run();
//!
//! assert_eq!(results.len(), 8);
//! assert_eq!(results[3], Ok(9));
//! ```
//!
//! # Determinism
//!
//! Each job receives only its `job_id`. As long as a job does not touch
//! shared mutable state its result does not depend on execution order or
//! thread count.
//!
//! # Error Handling
//!
//! Panics in individual jobs are caught and returned as `Err(String)`.
//! Other jobs continue executing normally.

use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Executes a batch of independent jobs in parallel
///
/// The job function `F` must be:
/// - `Fn(usize) -> R`: Takes job_id, returns that job's result
/// - `Send + Sync`: Safe to call from multiple threads
pub struct ParallelRunner<R, F>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    num_jobs: usize,
    job: F,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
}

impl<R, F> ParallelRunner<R, F>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    /// Create a new parallel runner
    ///
    /// # Arguments
    ///
    /// * `num_jobs` - Number of independent jobs to run
    /// * `job` - Closure that runs the job with the given job_id
    pub fn new(num_jobs: usize, job: F) -> Self {
        ParallelRunner {
            num_jobs,
            job,
            num_threads: None,
            progress_callback: None,
        }
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set progress callback (called after each job completes)
    ///
    /// The callback receives `(completed_count, total_count)`.
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all jobs and return results in job_id order
    ///
    /// - `Ok(R)` for jobs that returned
    /// - `Err(String)` for jobs that panicked
    pub fn run(self) -> Vec<Result<R, String>> {
        let progress_counter = AtomicUsize::new(0);

        let pool = self.num_threads.and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| warn!(threads = n, error = %e, "falling back to global rayon pool"))
                .ok()
        });

        let execute = || {
            (0..self.num_jobs)
                .into_par_iter()
                .map(|job_id| {
                    let result =
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (self.job)(job_id)));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_jobs);
                    }

                    result.map_err(|panic| {
                        if let Some(s) = panic.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        }
                    })
                })
                .collect()
        };

        if let Some(pool) = pool {
            pool.install(execute)
        } else {
            execute()
        }
    }
}

/// Run jobs in parallel with simple API
pub fn run_parallel<R, F>(num_jobs: usize, job: F) -> Vec<Result<R, String>>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    ParallelRunner::new(num_jobs, job).run()
}

/// Pre-built progress reporter logging every `interval` completed jobs
pub fn log_completion(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            info!(completed, total, "jobs completed");
        }
    }
}
