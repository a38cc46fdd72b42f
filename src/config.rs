//! Configuration types for fetch-bench

use crate::error::{Error, Result};
use crate::fetch::{Extract, FetchJob, INDEX_PLACEHOLDER};
use crate::types::{StrategyKind, WorkloadKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming a JSON config file to start from
pub const CONFIG_FILE_ENV: &str = "FETCH_BENCH_CONFIG";

/// Where each workload fetches from and where downloads land
///
/// Targets may contain `{index}`, which is replaced by the request index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Image download target (default: "https://picsum.photos/200/300")
    #[serde(default = "default_image_url")]
    pub image_url: String,

    /// UUID fetch target (default: "https://httpbin.org/uuid")
    #[serde(default = "default_uuid_url")]
    pub uuid_url: String,

    /// JSON field extracted from each UUID response (default: "uuid")
    #[serde(default = "default_uuid_field")]
    pub uuid_field: String,

    /// Root directory for downloaded images; each strategy writes to its own
    /// subdirectory (default: "./downloaded_images")
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            image_url: default_image_url(),
            uuid_url: default_uuid_url(),
            uuid_field: default_uuid_field(),
            output_root: default_output_root(),
        }
    }
}

impl TargetConfig {
    /// Output directory reserved for one strategy
    pub fn output_dir(&self, strategy: StrategyKind) -> PathBuf {
        self.output_root.join(strategy.as_str())
    }

    /// Resolve the fetch job a strategy runs for a workload
    pub fn job(&self, workload: WorkloadKind, strategy: StrategyKind) -> FetchJob {
        match workload {
            WorkloadKind::Image => FetchJob {
                target: self.image_url.clone(),
                extract: Extract::Save {
                    dir: self.output_dir(strategy),
                },
            },
            WorkloadKind::Uuid => FetchJob {
                target: self.uuid_url.clone(),
                extract: Extract::Field {
                    name: self.uuid_field.clone(),
                },
            },
        }
    }
}

/// Worker pool sizing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Threads in the thread-pool strategy (default: 10)
    #[serde(default = "default_thread_workers")]
    pub thread_workers: usize,

    /// Processes in the process-pool strategy (None = number of CPU cores)
    #[serde(default)]
    pub process_workers: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_workers: default_thread_workers(),
            process_workers: None,
        }
    }
}

impl PoolConfig {
    /// Effective process worker count
    pub fn process_workers(&self) -> usize {
        self.process_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Main configuration for the benchmark harness
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Requests per batch (default: 50)
    #[serde(default = "default_requests")]
    pub requests: usize,

    /// Workloads to benchmark, in order (default: image, uuid)
    #[serde(default = "default_workloads")]
    pub workloads: Vec<WorkloadKind>,

    /// Strategies to run for each workload, in order (default: all)
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,

    /// Targets and output locations
    #[serde(default)]
    pub targets: TargetConfig,

    /// Worker pool sizing
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            workloads: default_workloads(),
            strategies: default_strategies(),
            targets: TargetConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Build the config from the process environment
    ///
    /// Starts from the file named by `FETCH_BENCH_CONFIG` (or defaults) and
    /// applies individual `FETCH_BENCH_*` overrides on top.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(requests) = parse_var(&lookup, "FETCH_BENCH_REQUESTS")? {
            config.requests = requests;
        }
        if let Some(url) = lookup("FETCH_BENCH_IMAGE_URL") {
            config.targets.image_url = url;
        }
        if let Some(url) = lookup("FETCH_BENCH_UUID_URL") {
            config.targets.uuid_url = url;
        }
        if let Some(field) = lookup("FETCH_BENCH_UUID_FIELD") {
            config.targets.uuid_field = field;
        }
        if let Some(root) = lookup("FETCH_BENCH_OUTPUT_ROOT") {
            config.targets.output_root = PathBuf::from(root);
        }
        if let Some(workers) = parse_var(&lookup, "FETCH_BENCH_THREAD_WORKERS")? {
            config.pool.thread_workers = workers;
        }
        if let Some(workers) = parse_var(&lookup, "FETCH_BENCH_PROCESS_WORKERS")? {
            config.pool.process_workers = Some(workers);
        }
        if let Some(list) = parse_list(&lookup, "FETCH_BENCH_STRATEGIES")? {
            config.strategies = list;
        }
        if let Some(list) = parse_list(&lookup, "FETCH_BENCH_WORKLOADS")? {
            config.workloads = list;
        }

        Ok(config)
    }

    /// Reject settings the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(Error::config("strategies", "at least one strategy is required"));
        }
        if self.workloads.is_empty() {
            return Err(Error::config("workloads", "at least one workload is required"));
        }
        if self.pool.thread_workers == 0 {
            return Err(Error::config("thread_workers", "must be greater than zero"));
        }
        if self.pool.process_workers == Some(0) {
            return Err(Error::config("process_workers", "must be greater than zero"));
        }
        if self.targets.uuid_field.trim().is_empty() {
            return Err(Error::config("uuid_field", "field name must not be empty"));
        }
        validate_target("image_url", &self.targets.image_url)?;
        validate_target("uuid_url", &self.targets.uuid_url)?;
        Ok(())
    }
}

fn validate_target(key: &str, target: &str) -> Result<()> {
    let probe = target.replace(INDEX_PLACEHOLDER, "1");
    let url = url::Url::parse(&probe)
        .map_err(|e| Error::config(key, format!("invalid target '{target}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(
            key,
            format!("unsupported scheme '{other}' in '{target}'"),
        )),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::config(key, format!("invalid value '{raw}': {e}")))
        })
        .transpose()
}

fn parse_list<F, T>(lookup: &F, key: &str) -> Result<Option<Vec<T>>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr<Err = String>,
{
    lookup(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.parse::<T>().map_err(|e| Error::config(key, e)))
                .collect()
        })
        .transpose()
}

fn default_image_url() -> String {
    "https://picsum.photos/200/300".to_string()
}

fn default_uuid_url() -> String {
    "https://httpbin.org/uuid".to_string()
}

fn default_uuid_field() -> String {
    "uuid".to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./downloaded_images")
}

fn default_requests() -> usize {
    50
}

fn default_thread_workers() -> usize {
    10
}

fn default_workloads() -> Vec<WorkloadKind> {
    vec![WorkloadKind::Image, WorkloadKind::Uuid]
}

fn default_strategies() -> Vec<StrategyKind> {
    StrategyKind::ALL.to_vec()
}
