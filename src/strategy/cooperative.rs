//! Cooperative strategies: all fetches interleaved on a single thread
//!
//! Each batch gets its own current-thread runtime on a blocking thread, so the
//! interleaving is driven by one scheduler on one OS thread regardless of the
//! caller's runtime. One async client (one connection pool) serves the batch.
//! No timeout is imposed: a fetch that never resolves stalls the batch.

use super::{ExecutionStrategy, ResultSlots};
use crate::error::Result;
use crate::fetch::{FetchJob, fetch_async};
use crate::types::{BatchOutcome, FetchOutcome, RequestIndex, StrategyKind};
use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinSet, LocalSet};

/// Polls every fetch future together (join-all); no tasks are spawned
pub struct Cooperative {
    job: Arc<FetchJob>,
}

impl Cooperative {
    /// Create the strategy
    pub fn new(job: FetchJob) -> Self {
        Self { job: Arc::new(job) }
    }
}

#[async_trait]
impl ExecutionStrategy for Cooperative {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cooperative
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        tokio::task::spawn_blocking(move || {
            job.prepare()?;
            single_threaded_runtime()?.block_on(gather(&job, n))
        })
        .await?
    }
}

/// Spawns one local task per fetch, then joins them as they complete
pub struct CooperativeSpawned {
    job: Arc<FetchJob>,
}

impl CooperativeSpawned {
    /// Create the strategy
    pub fn new(job: FetchJob) -> Self {
        Self { job: Arc::new(job) }
    }
}

#[async_trait]
impl ExecutionStrategy for CooperativeSpawned {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CooperativeSpawned
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        tokio::task::spawn_blocking(move || -> Result<BatchOutcome> {
            job.prepare()?;
            let runtime = single_threaded_runtime()?;
            let client = reqwest::Client::builder().build()?;
            let local = LocalSet::new();
            Ok(local.block_on(
                &runtime,
                spawn_and_join(n, move |index| {
                    let (client, job) = (client.clone(), Arc::clone(&job));
                    async move { fetch_async(&client, &job, index).await }
                }),
            ))
        })
        .await?
    }
}

fn single_threaded_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

async fn gather(job: &FetchJob, n: usize) -> Result<BatchOutcome> {
    let client = reqwest::Client::builder().build()?;
    let fetches = RequestIndex::range(n).map(|index| fetch_async(&client, job, index));
    Ok(BatchOutcome::from_ordered(join_all(fetches).await))
}

/// Spawn one local task per index before awaiting any, then collect them as
/// they finish. Must run inside a [`LocalSet`].
async fn spawn_and_join<F, Fut>(n: usize, fetch: F) -> BatchOutcome
where
    F: Fn(RequestIndex) -> Fut,
    Fut: Future<Output = FetchOutcome> + 'static,
{
    let mut tasks = JoinSet::new();
    for index in RequestIndex::range(n) {
        let fetch = fetch(index);
        tasks.spawn_local(async move { (index, fetch.await) });
    }

    let mut slots = ResultSlots::new(n);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots.fill(index, outcome),
            // The slot stays empty and is reported as a failure by finish()
            Err(e) => tracing::error!(error = %e, "cooperative task did not complete"),
        }
    }
    slots.finish()
}
