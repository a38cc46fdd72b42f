//! Benchmark driver: runs every configured strategy under the timing wrapper

use crate::config::Config;
use crate::error::Result;
use crate::strategy::{self, ExecutionStrategy, StrategyOptions};
use crate::timer::{TimingRecord, measure};
use crate::types::{BatchOutcome, StrategyKind, WorkloadKind};
use crate::worker::WorkerLauncher;

/// What one strategy run produced
#[derive(Debug)]
pub struct StrategyReport {
    /// Workload that was run
    pub workload: WorkloadKind,
    /// Strategy that ran it
    pub kind: StrategyKind,
    /// Batch-level timing
    pub timing: TimingRecord,
    /// The batch, or the error that prevented it
    pub result: Result<BatchOutcome>,
}

impl StrategyReport {
    /// Successful fetches, zero if the batch failed outright
    pub fn successes(&self) -> usize {
        self.result.as_ref().map_or(0, BatchOutcome::success_count)
    }

    /// One human-readable line for the final summary
    pub fn summary_line(&self, requests: usize) -> String {
        match &self.result {
            Ok(batch) => format!(
                "{:<6} {:<20} {:>5}/{:<5} ok  {:>8.2}s",
                self.workload,
                self.kind,
                batch.success_count(),
                requests,
                self.timing.elapsed_secs()
            ),
            Err(e) => format!(
                "{:<6} {:<20} failed: {}  {:>8.2}s",
                self.workload,
                self.kind,
                e,
                self.timing.elapsed_secs()
            ),
        }
    }
}

/// Owns the configuration and runs strategies one after another
pub struct Harness {
    config: Config,
    options: StrategyOptions,
}

impl Harness {
    /// Create a harness; `launcher` starts process-pool workers
    pub fn new(config: Config, launcher: WorkerLauncher) -> Self {
        let options = StrategyOptions {
            thread_workers: config.pool.thread_workers,
            process_workers: config.pool.process_workers(),
            launcher,
        };
        Self { config, options }
    }

    /// The configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the configured strategies for a workload, in run order
    pub fn strategies(&self, workload: WorkloadKind) -> Vec<Box<dyn ExecutionStrategy>> {
        self.config
            .strategies
            .iter()
            .map(|&kind| strategy::build(kind, self.config.targets.job(workload, kind), &self.options))
            .collect()
    }

    /// Run every configured strategy for one workload
    ///
    /// A strategy whose batch fails is reported and the next one still runs.
    pub async fn run(&self, workload: WorkloadKind) -> Vec<StrategyReport> {
        let n = self.config.requests;
        let mut reports = Vec::with_capacity(self.config.strategies.len());

        for strategy in self.strategies(workload) {
            let kind = strategy.kind();
            let args = format!("workload={workload}, n={n}");
            let (result, timing) = measure(kind.as_str(), args, strategy.run_batch(n)).await;

            match &result {
                Ok(batch) => {
                    tracing::info!(
                        strategy = %kind,
                        successes = batch.success_count(),
                        failures = batch.failure_count(),
                        "batch complete"
                    );
                    if workload == WorkloadKind::Uuid {
                        tracing::debug!(strategy = %kind, values = ?batch.fields(), "fetched values");
                    }
                }
                Err(e) => {
                    tracing::error!(strategy = %kind, error = %e, "batch failed");
                }
            }

            reports.push(StrategyReport {
                workload,
                kind,
                timing,
                result,
            });
        }

        reports
    }

    /// Run every configured workload in order
    pub async fn run_all(&self) -> Vec<StrategyReport> {
        let mut reports = Vec::new();
        for &workload in &self.config.workloads {
            tracing::info!(workload = %workload, requests = self.config.requests, "starting workload");
            reports.extend(self.run(workload).await);
        }
        reports
    }
}
