//! Thread pool strategy: a fixed rayon pool of OS threads sharing one
//! blocking client.
//!
//! `reqwest::blocking::Client` is `Send + Sync` and pools its connections
//! internally, so workers use it concurrently without extra locking. Tasks are
//! spawned FIFO, so indices are picked up in submission order. A panic inside
//! a fetch is caught on the worker and recorded for that index only.

use super::{ExecutionStrategy, ResultSlots, panic_message};
use crate::error::Result;
use crate::fetch::{FetchJob, fetch_blocking};
use crate::types::{BatchOutcome, FailureReason, FetchOutcome, RequestIndex, StrategyKind};
use async_trait::async_trait;
use rayon::ThreadPoolBuilder;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

/// Bounded pool of worker threads sharing one client
pub struct ThreadPool {
    job: Arc<FetchJob>,
    workers: usize,
}

impl ThreadPool {
    /// Create the strategy with `workers` threads (at least one)
    pub fn new(job: FetchJob, workers: usize) -> Self {
        Self {
            job: Arc::new(job),
            workers: workers.max(1),
        }
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[async_trait]
impl ExecutionStrategy for ThreadPool {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ThreadPool
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        let workers = self.workers;
        tokio::task::spawn_blocking(move || run_pool(&job, n, workers)).await?
    }
}

fn run_pool(job: &FetchJob, n: usize, workers: usize) -> Result<BatchOutcome> {
    job.prepare()?;
    let client = reqwest::blocking::Client::builder().build()?;
    let pool = build_pool(workers.min(n).max(1))?;

    Ok(fan_out(&pool, n, |index| {
        fetch_blocking(Some(&client), job, index)
    }))
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|worker| format!("fetch-worker-{worker}"))
        .build()?)
}

/// Spawn one pool task per index, in index order, and wait for all of them
fn fan_out<F>(pool: &rayon::ThreadPool, n: usize, fetch: F) -> BatchOutcome
where
    F: Fn(RequestIndex) -> FetchOutcome + Sync,
{
    let slots = Mutex::new(ResultSlots::new(n));

    pool.scope_fifo(|scope| {
        for index in RequestIndex::range(n) {
            let (fetch, slots) = (&fetch, &slots);
            scope.spawn_fifo(move |_| {
                let outcome = catch_unwind(AssertUnwindSafe(|| fetch(index))).unwrap_or_else(
                    |payload| {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(index = index.get(), error = %message, "fetch worker panicked");
                        FetchOutcome::Failure(FailureReason::Worker(message))
                    },
                );
                slots
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .fill(index, outcome);
            });
        }
    });

    slots
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .finish()
}
