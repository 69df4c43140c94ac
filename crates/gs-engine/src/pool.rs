//! TaskPool - bounded-concurrency job execution
//!
//! - Jobs are collected before execution starts
//! - `min(concurrency, jobs)` workers pull from one shared queue
//! - Every job is attempted exactly once; nothing is retried or rolled back
//! - Outputs and errors are collected as values and returned together

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A unit of work run by the pool.
///
/// Jobs return their contribution as a value rather than writing into shared
/// state. Deadlines are the job's own concern; the pool enforces none.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: Display + Send + 'static;

    async fn run(&self) -> Result<Self::Output, Self::Error>;
}

/// Adapts an async closure into a [`Job`].
pub struct JobFn<F> {
    f: F,
}

/// Build a job from a closure returning a future.
///
/// ```rust,ignore
/// let job = job_fn(move || async move { fetch_roles(&user_id).await });
/// ```
pub fn job_fn<F>(f: F) -> JobFn<F> {
    JobFn { f }
}

#[async_trait]
impl<F, Fut, T, E> Job for JobFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    type Output = T;
    type Error = E;

    async fn run(&self) -> Result<T, E> {
        (self.f)().await
    }
}

/// Type-erased job, for pools mixing several job types with one output.
pub type BoxedJob<T, E> = Box<dyn Job<Output = T, Error = E>>;

#[async_trait]
impl<T, E> Job for BoxedJob<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    type Output = T;
    type Error = E;

    async fn run(&self) -> Result<T, E> {
        (**self).run().await
    }
}

/// A job that returned an error, tagged with its submission index.
#[derive(Debug)]
pub struct JobFailure<E> {
    pub index: usize,
    pub error: E,
}

/// Everything a pool run produced.
///
/// Outputs of successful jobs are kept even when siblings failed. Errors are
/// stored in the order they were observed, which is not submission order.
#[derive(Debug)]
pub struct PoolOutcome<T, E> {
    attempted: usize,
    outputs: Vec<(usize, T)>,
    errors: Vec<JobFailure<E>>,
}

impl<T, E> PoolOutcome<T, E> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            attempted: 0,
            outputs: Vec::with_capacity(capacity),
            errors: Vec::new(),
        }
    }

    /// Number of jobs whose `run` completed.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first error observed, if any job failed.
    pub fn first_error(&self) -> Option<&E> {
        self.errors.first().map(|f| &f.error)
    }

    pub fn errors(&self) -> &[JobFailure<E>] {
        &self.errors
    }

    /// Successful outputs tagged with submission index, in completion order.
    pub fn outputs(&self) -> &[(usize, T)] {
        &self.outputs
    }

    /// Successful outputs in submission order.
    pub fn into_outputs(self) -> Vec<T> {
        let mut outputs = self.outputs;
        outputs.sort_by_key(|(index, _)| *index);
        outputs.into_iter().map(|(_, output)| output).collect()
    }

    /// Fail-fast view: the first observed error, or every output in submission order.
    pub fn into_result(mut self) -> Result<Vec<T>, E> {
        if self.errors.is_empty() {
            Ok(self.into_outputs())
        } else {
            Err(self.errors.swap_remove(0).error)
        }
    }
}

/// Bounded-concurrency pool over a fixed set of jobs.
pub struct TaskPool<J: Job> {
    concurrency: usize,
    jobs: Vec<J>,
}

impl<J: Job> TaskPool<J> {
    /// Create a pool running at most `concurrency` jobs at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            jobs: Vec::new(),
        }
    }

    pub fn add_job(&mut self, job: J) {
        self.jobs.push(job);
    }

    pub fn with_jobs(mut self, jobs: impl IntoIterator<Item = J>) -> Self {
        self.jobs.extend(jobs);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run every job and wait for all of them.
    ///
    /// A panicking job is resumed on the caller once the remaining workers finish.
    pub async fn execute(self) -> PoolOutcome<J::Output, J::Error> {
        let total = self.jobs.len();
        let mut outcome = PoolOutcome::with_capacity(total);
        if total == 0 {
            return outcome;
        }

        let workers = self.concurrency.min(total);
        debug!(jobs = total, workers, "Starting task pool");

        let queue: Arc<Mutex<VecDeque<(usize, J)>>> =
            Arc::new(Mutex::new(self.jobs.into_iter().enumerate().collect()));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let result_tx = result_tx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().pop_front();
                    let Some((index, job)) = next else {
                        break;
                    };

                    let result = job.run().await;
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Pool worker exiting");
            }));
        }
        drop(result_tx);

        while let Some((index, result)) = result_rx.recv().await {
            outcome.attempted += 1;
            match result {
                Ok(output) => outcome.outputs.push((index, output)),
                Err(error) => {
                    warn!(job = index, error = %error, "Job failed");
                    outcome.errors.push(JobFailure { index, error });
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }

        debug!(
            jobs = total,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "Task pool finished"
        );
        outcome
    }
}
