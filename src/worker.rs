//! Worker process side of the process-pool strategy
//!
//! A worker is this crate's own binary started as
//! `<program> __worker <job-json>`. It builds one blocking client for its whole
//! life, reads request indices from stdin (one per line) and answers each with
//! one JSON [`WorkerReply`] line on stdout. Logs go to stderr so stdout stays a
//! clean protocol channel.

use crate::error::{Error, Result};
use crate::fetch::{FetchJob, fetch_blocking};
use crate::types::{FetchOutcome, RequestIndex};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Hidden subcommand that switches the binary into worker mode
pub const WORKER_SUBCOMMAND: &str = "__worker";

/// One result line written by a worker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReply {
    /// Request the outcome belongs to
    pub index: RequestIndex,
    /// Outcome of the fetch
    pub outcome: FetchOutcome,
}

/// How the process pool starts a worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerLauncher {
    /// Launch workers with an explicit program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Launch workers by re-executing the running binary
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Extra arguments placed before the worker subcommand
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program that will be executed
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line for a worker serving `job_json`
    pub(crate) fn command(&self, job_json: &str) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .arg(WORKER_SUBCOMMAND)
            .arg(job_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

/// Recognise worker-mode arguments (`[program, "__worker", job_json, ..]`)
///
/// Returns `None` when the binary should run the harness instead.
pub fn parse_worker_args(args: &[String]) -> Option<Result<FetchJob>> {
    let position = args.iter().position(|arg| arg == WORKER_SUBCOMMAND)?;
    Some(match args.get(position + 1) {
        Some(json) => serde_json::from_str(json).map_err(Error::from),
        None => Err(Error::Worker(format!(
            "{WORKER_SUBCOMMAND} requires a job argument"
        ))),
    })
}

/// Serve fetch requests until `input` reaches EOF
pub fn serve<R, W>(job: &FetchJob, input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    job.prepare()?;
    let client = reqwest::blocking::Client::builder().build()?;
    tracing::debug!(pid = std::process::id(), target = %job.target, "worker ready");

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let index: RequestIndex = line
            .parse()
            .map_err(|e| Error::Worker(format!("invalid index '{line}': {e}")))?;

        let reply = WorkerReply {
            index,
            outcome: fetch_blocking(Some(&client), job, index),
        };
        serde_json::to_writer(&mut output, &reply)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }

    tracing::debug!(pid = std::process::id(), "worker input closed, exiting");
    Ok(())
}
