//! Wall-clock timing around any operation
//!
//! One [`Stopwatch`] implementation backs both [`measure`] (futures) and
//! [`measure_blocking`] (closures). Elapsed time is taken from a monotonic
//! clock and includes time spent suspended or blocked on I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Timing of one measured operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Name of the measured operation
    pub operation: String,
    /// Human-readable summary of the operation's arguments
    pub args: String,
    /// Wall-clock start, for reports
    pub started_at: DateTime<Utc>,
    /// Wall-clock end, for reports
    pub finished_at: DateTime<Utc>,
    /// Monotonic elapsed time
    pub elapsed: Duration,
}

impl TimingRecord {
    /// Elapsed time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// A running timer; construct it around any invocation and call [`Stopwatch::stop`]
#[derive(Debug)]
pub struct Stopwatch {
    operation: String,
    args: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Stopwatch {
    /// Start timing `operation`
    #[must_use]
    pub fn start(operation: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            args: args.into(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Stop the timer, log the result and return the record
    pub fn stop(self) -> TimingRecord {
        let record = TimingRecord {
            elapsed: self.started.elapsed(),
            operation: self.operation,
            args: self.args,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            operation = %record.operation,
            args = %record.args,
            elapsed_secs = %format!("{:.2}", record.elapsed_secs()),
            "time taken"
        );
        record
    }
}

/// Await `operation` and report how long it took, suspension included
pub async fn measure<F, T>(
    operation: impl Into<String>,
    args: impl Into<String>,
    future: F,
) -> (T, TimingRecord)
where
    F: Future<Output = T>,
{
    let stopwatch = Stopwatch::start(operation, args);
    let value = future.await;
    (value, stopwatch.stop())
}

/// Run `operation` on the calling thread and report how long it took
pub fn measure_blocking<F, T>(
    operation: impl Into<String>,
    args: impl Into<String>,
    f: F,
) -> (T, TimingRecord)
where
    F: FnOnce() -> T,
{
    let stopwatch = Stopwatch::start(operation, args);
    let value = f();
    (value, stopwatch.stop())
}
