//! Sequential strategies: one request at a time on a blocking thread

use super::ExecutionStrategy;
use crate::error::Result;
use crate::fetch::{FetchJob, fetch_blocking};
use crate::types::{BatchOutcome, RequestIndex, StrategyKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens and discards a connection for every request
pub struct SequentialCold {
    job: Arc<FetchJob>,
}

impl SequentialCold {
    /// Create the strategy
    pub fn new(job: FetchJob) -> Self {
        Self { job: Arc::new(job) }
    }
}

#[async_trait]
impl ExecutionStrategy for SequentialCold {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SequentialCold
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        tokio::task::spawn_blocking(move || run_sequential(&job, n, None)).await?
    }
}

/// Reuses one client (and its keep-alive connection) for the whole batch
pub struct SequentialWarm {
    job: Arc<FetchJob>,
}

impl SequentialWarm {
    /// Create the strategy
    pub fn new(job: FetchJob) -> Self {
        Self { job: Arc::new(job) }
    }
}

#[async_trait]
impl ExecutionStrategy for SequentialWarm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SequentialWarm
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        tokio::task::spawn_blocking(move || {
            let client = reqwest::blocking::Client::builder().build()?;
            run_sequential(&job, n, Some(&client))
        })
        .await?
    }
}

/// Strict index order; a failed fetch does not stop the loop
fn run_sequential(
    job: &FetchJob,
    n: usize,
    client: Option<&reqwest::blocking::Client>,
) -> Result<BatchOutcome> {
    job.prepare()?;
    let outcomes = RequestIndex::range(n)
        .map(|index| fetch_blocking(client, job, index))
        .collect();
    Ok(BatchOutcome::from_ordered(outcomes))
}
