//! Execution strategies: the same batch of fetches under different concurrency models
//!
//! Every strategy implements [`ExecutionStrategy`]: prepare its resources, issue
//! exactly `n` fetches with indices `1..=n`, wait for all of them, and return an
//! index-ordered [`BatchOutcome`]. Only resource acquisition failures escape as
//! errors; individual fetch failures are part of the outcome.
//!
//! - [`sequential`] - cold (connection per request) and warm (one reused client)
//! - [`cooperative`] - single-threaded interleaving, join-all and spawned tasks
//! - [`thread_pool`] - fixed pool of OS threads sharing one client
//! - [`process_pool`] - fixed pool of worker processes, one client each

pub mod cooperative;
pub mod process_pool;
pub mod sequential;
pub mod thread_pool;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use cooperative::{Cooperative, CooperativeSpawned};
pub use process_pool::ProcessPool;
pub use sequential::{SequentialCold, SequentialWarm};
pub use thread_pool::ThreadPool;

use crate::error::Result;
use crate::fetch::FetchJob;
use crate::types::{BatchOutcome, FailureReason, FetchOutcome, RequestIndex, StrategyKind};
use crate::worker::WorkerLauncher;
use async_trait::async_trait;
use std::any::Any;

/// A concurrency model that can run a batch of fetches
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// The job every fetch of the batch performs
    fn job(&self) -> &FetchJob;

    /// Run `n` fetches and return once every one of them has resolved
    async fn run_batch(&self, n: usize) -> Result<BatchOutcome>;
}

/// Sizing and launch settings shared by the pooled strategies
#[derive(Clone, Debug)]
pub struct StrategyOptions {
    /// Threads in the thread pool
    pub thread_workers: usize,
    /// Processes in the process pool
    pub process_workers: usize,
    /// How to start a worker process
    pub launcher: WorkerLauncher,
}

/// Construct a strategy of the given kind around a job
pub fn build(
    kind: StrategyKind,
    job: FetchJob,
    options: &StrategyOptions,
) -> Box<dyn ExecutionStrategy> {
    match kind {
        StrategyKind::SequentialCold => Box::new(SequentialCold::new(job)),
        StrategyKind::SequentialWarm => Box::new(SequentialWarm::new(job)),
        StrategyKind::Cooperative => Box::new(Cooperative::new(job)),
        StrategyKind::CooperativeSpawned => Box::new(CooperativeSpawned::new(job)),
        StrategyKind::ThreadPool => Box::new(ThreadPool::new(job, options.thread_workers)),
        StrategyKind::ProcessPool => Box::new(ProcessPool::new(
            job,
            options.process_workers,
            options.launcher.clone(),
        )),
    }
}

/// Fixed-size result buffer, written at each fetch's own index
///
/// Completion order does not matter; [`ResultSlots::finish`] always yields
/// exactly `n` outcomes.
#[derive(Debug)]
pub(crate) struct ResultSlots {
    slots: Vec<Option<FetchOutcome>>,
}

impl ResultSlots {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            slots: vec![None; n],
        }
    }

    /// Record the outcome for `index`; the first report for an index wins
    pub(crate) fn fill(&mut self, index: RequestIndex, outcome: FetchOutcome) {
        let Some(slot) = index
            .get()
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
        else {
            tracing::warn!(index = index.get(), "result for index outside the batch ignored");
            return;
        };

        if slot.is_some() {
            tracing::warn!(index = index.get(), "duplicate result ignored");
            return;
        }
        *slot = Some(outcome);
    }

    pub(crate) fn finish(self) -> BatchOutcome {
        let outcomes = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(slot, outcome)| {
                outcome.unwrap_or_else(|| {
                    tracing::warn!(index = slot + 1, "no result reported");
                    FetchOutcome::Failure(FailureReason::Worker(
                        "no result was reported for this request".to_string(),
                    ))
                })
            })
            .collect();
        BatchOutcome::from_ordered(outcomes)
    }
}

/// Render a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    fn ok(value: &str) -> FetchOutcome {
        FetchOutcome::Success(Payload::Field(value.into()))
    }

    #[test]
    fn test_slots_accept_any_completion_order() {
        let mut slots = ResultSlots::new(3);
        slots.fill(RequestIndex(3), ok("c"));
        slots.fill(RequestIndex(1), ok("a"));
        slots.fill(RequestIndex(2), ok("b"));

        let batch = slots.finish();
        assert_eq!(batch.fields(), vec![Some("a"), Some("b"), Some("c")]);
    }

    #[test]
    fn test_slots_fill_missing_with_failure() {
        let mut slots = ResultSlots::new(2);
        slots.fill(RequestIndex(2), ok("b"));

        let batch = slots.finish();
        assert_eq!(batch.len(), 2);
        assert!(matches!(
            batch.get(RequestIndex(1)),
            Some(FetchOutcome::Failure(FailureReason::Worker(_)))
        ));
    }

    #[test]
    fn test_slots_ignore_duplicates_and_out_of_range() {
        let mut slots = ResultSlots::new(1);
        slots.fill(RequestIndex(1), ok("first"));
        slots.fill(RequestIndex(1), ok("second"));
        slots.fill(RequestIndex(0), ok("zero"));
        slots.fill(RequestIndex(5), ok("five"));

        let batch = slots.finish();
        assert_eq!(batch.fields(), vec![Some("first")]);
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");

        let payload = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicked: formatted 1");
    }
}
