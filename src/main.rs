//! fetch-bench binary
//!
//! Without arguments: load the config from the environment (and `.env`), run
//! every configured workload through every configured strategy, and print a
//! summary. With `__worker <job-json>`: serve as a process-pool worker.

use fetch_bench::worker::{parse_worker_args, serve};
use fetch_bench::{Config, FetchJob, Harness, WorkerLauncher};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if let Some(job) = parse_worker_args(&args) {
        init_tracing();
        return run_worker(job?);
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_harness(config))
}

fn run_worker(job: FetchJob) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(&job, stdin.lock(), stdout.lock())?;
    Ok(())
}

async fn run_harness(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let requests = config.requests;
    tracing::info!(
        requests,
        strategies = ?config.strategies,
        workloads = ?config.workloads,
        "fetch-bench starting"
    );

    let harness = Harness::new(config, WorkerLauncher::current_exe()?);
    let reports = harness.run_all().await;

    println!("═══════════════════════════════════════════════════════════");
    println!("  fetch-bench results (n = {requests})");
    println!("═══════════════════════════════════════════════════════════");
    for report in &reports {
        println!("  {}", report.summary_line(requests));
    }
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}

/// Logs go to stderr; in worker mode stdout carries the reply protocol
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fetch_bench=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
