//! # fetch-bench
//!
//! Runs the same bulk HTTP workload (N independent GETs) under several
//! concurrency strategies and times each one, so the cost of connection reuse,
//! cooperative scheduling and true parallelism can be compared on an I/O-bound
//! job.
//!
//! ## Strategies
//!
//! | Strategy | Parallelism | Client |
//! |---|---|---|
//! | `sequential_cold` | none | new connection per request |
//! | `sequential_warm` | none | one client for the batch |
//! | `cooperative` | one thread, join-all | one async client |
//! | `cooperative_spawned` | one thread, local tasks | one async client |
//! | `thread_pool` | fixed OS threads | one shared client |
//! | `process_pool` | fixed worker processes | one client per process |
//!
//! Every strategy returns exactly N index-addressable results; a failing
//! request never aborts its siblings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetch_bench::{Config, Harness, WorkerLauncher, WorkloadKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         requests: 20,
//!         ..Default::default()
//!     };
//!     config.validate()?;
//!
//!     let harness = Harness::new(config, WorkerLauncher::current_exe()?);
//!     for report in harness.run(WorkloadKind::Uuid).await {
//!         println!("{}", report.summary_line(20));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The per-request fetch operation
pub mod fetch;
/// Benchmark driver
pub mod harness;
/// Concurrency strategies
pub mod strategy;
/// Timing wrapper
pub mod timer;
/// Core types
pub mod types;
/// Process-pool worker side
pub mod worker;

// Re-export commonly used types
pub use config::{Config, PoolConfig, TargetConfig};
pub use error::{Error, Result};
pub use fetch::{Extract, FetchJob};
pub use harness::{Harness, StrategyReport};
pub use strategy::{ExecutionStrategy, StrategyOptions};
pub use timer::{Stopwatch, TimingRecord, measure, measure_blocking};
pub use types::{
    BatchOutcome, FailureReason, FetchOutcome, Payload, RequestIndex, StrategyKind, WorkloadKind,
};
pub use worker::{WORKER_SUBCOMMAND, WorkerLauncher, WorkerReply};
