//! Core types for fetch-bench

use serde::{Deserialize, Serialize};
use std::fmt;

/// One logical fetch within a batch, numbered from 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestIndex(pub usize);

impl RequestIndex {
    /// Create a new RequestIndex
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the inner value
    pub fn get(&self) -> usize {
        self.0
    }

    /// Every index of a batch of `n` requests, in issuance order
    pub fn range(n: usize) -> impl Iterator<Item = RequestIndex> {
        (1..=n).map(RequestIndex)
    }
}

impl From<usize> for RequestIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for RequestIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// What a successful fetch produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Raw response body (image download)
    Bytes(Vec<u8>),
    /// A single field extracted from a JSON body (UUID fetch)
    Field(String),
}

impl Payload {
    /// The extracted field, if this payload carries one
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Payload::Field(value) => Some(value),
            Payload::Bytes(_) => None,
        }
    }

    /// Size of the payload in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Field(value) => value.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a single fetch failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The server answered with a non-2xx status
    Status(u16),
    /// The body could not be decoded or lacked the requested field
    Decode(String),
    /// The request never produced a response (connect, reset, body stream)
    Transport(String),
    /// The payload could not be written to disk
    Storage(String),
    /// The worker executing the fetch died or never reported
    Worker(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status(code) => write!(f, "status code {code}"),
            FailureReason::Decode(msg) => write!(f, "decode error: {msg}"),
            FailureReason::Transport(msg) => write!(f, "transport error: {msg}"),
            FailureReason::Storage(msg) => write!(f, "storage error: {msg}"),
            FailureReason::Worker(msg) => write!(f, "worker error: {msg}"),
        }
    }
}

/// Result of one fetch. Never escapes as an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The fetch produced a payload
    Success(Payload),
    /// The fetch failed; siblings are unaffected
    Failure(FailureReason),
}

impl FetchOutcome {
    /// Whether this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// The failure reason, if any
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            FetchOutcome::Failure(reason) => Some(reason),
            FetchOutcome::Success(_) => None,
        }
    }

    /// The extracted field of a successful UUID-style fetch
    pub fn field(&self) -> Option<&str> {
        match self {
            FetchOutcome::Success(payload) => payload.as_field(),
            FetchOutcome::Failure(_) => None,
        }
    }
}

/// Index-ordered results of one batch; entry `i - 1` belongs to request `i`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    outcomes: Vec<FetchOutcome>,
}

impl BatchOutcome {
    /// Build from outcomes already in index order
    pub fn from_ordered(outcomes: Vec<FetchOutcome>) -> Self {
        Self { outcomes }
    }

    /// Number of results (always equals the batch size)
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Result for a given request index
    pub fn get(&self, index: RequestIndex) -> Option<&FetchOutcome> {
        index
            .get()
            .checked_sub(1)
            .and_then(|slot| self.outcomes.get(slot))
    }

    /// Iterate `(index, outcome)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (RequestIndex, &FetchOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .map(|(slot, outcome)| (RequestIndex(slot + 1), outcome))
    }

    /// Number of successful fetches
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed fetches
    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Failed indices with their reasons
    pub fn failures(&self) -> Vec<(RequestIndex, &FailureReason)> {
        self.iter()
            .filter_map(|(index, outcome)| outcome.failure().map(|reason| (index, reason)))
            .collect()
    }

    /// Extracted fields in index order (`None` where the fetch failed)
    pub fn fields(&self) -> Vec<Option<&str>> {
        self.outcomes.iter().map(FetchOutcome::field).collect()
    }

    /// Consume into the ordered outcomes
    pub fn into_inner(self) -> Vec<FetchOutcome> {
        self.outcomes
    }
}

/// The concurrency strategies the harness compares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// New connection per request, one at a time
    SequentialCold,
    /// One reused connection, one request at a time
    SequentialWarm,
    /// All requests polled together on one thread (join-all)
    Cooperative,
    /// One local task per request on one thread, then joined
    CooperativeSpawned,
    /// Fixed-size OS thread pool sharing one client
    ThreadPool,
    /// Fixed-size pool of worker processes, one client each
    ProcessPool,
}

impl StrategyKind {
    /// Every strategy in harness order
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::SequentialCold,
        StrategyKind::SequentialWarm,
        StrategyKind::Cooperative,
        StrategyKind::CooperativeSpawned,
        StrategyKind::ThreadPool,
        StrategyKind::ProcessPool,
    ];

    /// Stable name, also used as the strategy's output directory
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::SequentialCold => "sequential_cold",
            StrategyKind::SequentialWarm => "sequential_warm",
            StrategyKind::Cooperative => "cooperative",
            StrategyKind::CooperativeSpawned => "cooperative_spawned",
            StrategyKind::ThreadPool => "thread_pool",
            StrategyKind::ProcessPool => "process_pool",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown strategy '{}'", s.trim()))
    }
}

/// The two workloads the harness benchmarks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Download binary bodies to disk
    Image,
    /// Extract a JSON field from each body
    Uuid,
}

impl WorkloadKind {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Image => "image",
            WorkloadKind::Uuid => "uuid",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(WorkloadKind::Image),
            "uuid" | "uuids" => Ok(WorkloadKind::Uuid),
            other => Err(format!("unknown workload '{other}'")),
        }
    }
}
