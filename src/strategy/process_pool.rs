//! Process pool strategy: a fixed number of worker processes, each with its
//! own client, fed one index at a time over stdin.
//!
//! Nothing is shared by reference across the process boundary. The job is
//! passed on the worker's command line and outcomes come back serialized as
//! JSON lines. A worker that dies (or garbles its reply) costs exactly the
//! index it was working on: that index is recorded as a worker failure, the
//! process is reaped, and a replacement is started for the next index. A
//! worker that exits while idle, or exits cleanly without reading its index,
//! is replaced and the index goes to the fresh worker instead.

use super::{ExecutionStrategy, ResultSlots};
use crate::error::{Error, Result};
use crate::fetch::FetchJob;
use crate::types::{BatchOutcome, FailureReason, FetchOutcome, RequestIndex, StrategyKind};
use crate::worker::{WorkerLauncher, WorkerReply};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Bounded pool of worker processes
pub struct ProcessPool {
    job: Arc<FetchJob>,
    workers: usize,
    launcher: WorkerLauncher,
}

impl ProcessPool {
    /// Create the strategy with `workers` processes (at least one)
    pub fn new(job: FetchJob, workers: usize, launcher: WorkerLauncher) -> Self {
        Self {
            job: Arc::new(job),
            workers: workers.max(1),
            launcher,
        }
    }

    /// Number of worker processes
    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[async_trait]
impl ExecutionStrategy for ProcessPool {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProcessPool
    }

    fn job(&self) -> &FetchJob {
        &self.job
    }

    async fn run_batch(&self, n: usize) -> Result<BatchOutcome> {
        let job = Arc::clone(&self.job);
        let prepared = tokio::task::spawn_blocking(move || job.prepare()).await?;
        prepared?;

        let job_json = serde_json::to_string(self.job.as_ref())?;
        let queue = IndexQueue::new(n);

        let per_worker = try_join_all(
            (0..self.workers.min(n))
                .map(|slot| drive_worker(slot, &self.launcher, &job_json, &queue)),
        )
        .await?;

        let mut slots = ResultSlots::new(n);
        for (index, outcome) in per_worker.into_iter().flatten() {
            slots.fill(index, outcome);
        }
        Ok(slots.finish())
    }
}

/// Hands out `1..=n` in ascending order to whichever worker asks next
struct IndexQueue {
    next: AtomicUsize,
    n: usize,
}

impl IndexQueue {
    fn new(n: usize) -> Self {
        Self {
            next: AtomicUsize::new(1),
            n,
        }
    }

    fn next(&self) -> Option<RequestIndex> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        (index <= self.n).then_some(RequestIndex(index))
    }
}

/// Times an index is offered to workers that exit without taking it
const DELIVERY_ATTEMPTS: usize = 2;

/// Keep one worker slot busy until the queue is drained
async fn drive_worker(
    slot: usize,
    launcher: &WorkerLauncher,
    job_json: &str,
    queue: &IndexQueue,
) -> Result<Vec<(RequestIndex, FetchOutcome)>> {
    let mut results = Vec::new();
    let mut idle: Option<WorkerProcess> = None;

    while let Some(index) = queue.next() {
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let mut process = match idle.take().and_then(|process| process.still_running(slot)) {
                Some(process) => process,
                None => WorkerProcess::spawn(launcher, job_json)?,
            };

            let error = match process.submit(index).await {
                Ok(outcome) => {
                    idle = Some(process);
                    break outcome;
                }
                Err(error) => error,
            };

            let status = process.reap().await;
            if !error.reached_worker(&status) && attempt < DELIVERY_ATTEMPTS {
                tracing::warn!(
                    slot,
                    index = index.get(),
                    reason = %error,
                    status = %describe(&status),
                    "worker exited without taking the request, retrying on a fresh worker"
                );
                continue;
            }

            tracing::error!(
                slot,
                index = index.get(),
                reason = %error,
                status = %describe(&status),
                "worker process failed, replacing it"
            );
            break FetchOutcome::Failure(FailureReason::Worker(format!(
                "{error} ({})",
                describe(&status)
            )));
        };
        results.push((index, outcome));
    }

    if let Some(process) = idle {
        process.shutdown(slot).await;
    }
    Ok(results)
}

/// Why a submitted index got no reply
#[derive(Debug)]
enum SubmitError {
    /// The index could not be written to the worker
    Send(String),
    /// The worker closed its output without replying
    Closed,
    /// The worker replied with something other than a reply for this index
    Reply(String),
}

impl SubmitError {
    /// Whether the worker may have started on the index
    ///
    /// Workers only exit cleanly once their input is closed, so a clean exit
    /// without a reply means the index was never read.
    fn reached_worker(&self, status: &std::io::Result<ExitStatus>) -> bool {
        match self {
            SubmitError::Send(_) => false,
            SubmitError::Closed => !matches!(status, Ok(status) if status.success()),
            SubmitError::Reply(_) => true,
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Send(e) => write!(f, "could not send request: {e}"),
            SubmitError::Closed => f.write_str("worker exited before replying"),
            SubmitError::Reply(e) => f.write_str(e),
        }
    }
}

fn describe(status: &std::io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("exit status unknown: {e}"),
    }
}

/// A running worker and its protocol pipes
struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    fn spawn(launcher: &WorkerLauncher, job_json: &str) -> Result<Self> {
        let mut child = launcher.command(job_json).spawn().map_err(|e| {
            Error::Worker(format!(
                "failed to spawn {}: {e}",
                launcher.program().display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Worker("worker stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Worker("worker stdout was not captured".to_string()))?;

        tracing::debug!(pid = ?child.id(), "worker process started");
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Hand back a worker that is still alive, or `None` if it exited while idle
    fn still_running(mut self, slot: usize) -> Option<Self> {
        match self.child.try_wait() {
            Ok(None) => Some(self),
            Ok(Some(status)) => {
                tracing::debug!(slot, status = %status, "idle worker process exited, replacing it");
                None
            }
            Err(e) => {
                tracing::warn!(slot, error = %e, "could not poll idle worker process, replacing it");
                None
            }
        }
    }

    /// Send one index and wait for its reply
    async fn submit(&mut self, index: RequestIndex) -> std::result::Result<FetchOutcome, SubmitError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SubmitError::Send("worker input already closed".to_string()))?;
        stdin
            .write_all(format!("{index}\n").as_bytes())
            .await
            .map_err(|e| SubmitError::Send(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SubmitError::Send(e.to_string()))?;

        let line = match self.stdout.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Err(SubmitError::Closed),
            Err(e) => return Err(SubmitError::Reply(format!("could not read reply: {e}"))),
        };

        let reply: WorkerReply = serde_json::from_str(&line)
            .map_err(|e| SubmitError::Reply(format!("unreadable reply: {e}")))?;
        if reply.index != index {
            return Err(SubmitError::Reply(format!(
                "reply for index {} while waiting for {index}",
                reply.index
            )));
        }
        Ok(reply.outcome)
    }

    /// Make sure a failed worker is gone and report how it ended
    async fn reap(mut self) -> std::io::Result<ExitStatus> {
        drop(self.stdin.take());
        // Already-exited children make start_kill fail; wait() still reports the status
        let _ = self.child.start_kill();
        self.child.wait().await
    }

    /// Close stdin and wait for a clean exit
    async fn shutdown(mut self, slot: usize) {
        drop(self.stdin.take());
        match self.child.wait().await {
            Ok(status) if status.success() => {
                tracing::debug!(slot, "worker process exited");
            }
            Ok(status) => {
                tracing::warn!(slot, status = %status, "worker process exited uncleanly");
            }
            Err(e) => {
                tracing::warn!(slot, error = %e, "could not wait for worker process");
            }
        }
    }
}
