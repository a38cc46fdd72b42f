//! Error types for fetch-bench
//!
//! Two layers of failure exist in this crate:
//! - [`Error`] covers batch-level problems (configuration, resource acquisition,
//!   worker spawning). These propagate out of a strategy's `run_batch`.
//! - [`FailureReason`](crate::types::FailureReason) covers a single request. It is
//!   data, not an error, and is always captured into the batch outcome.

use thiserror::Error;

/// Result type alias for fetch-bench operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-bench
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "requests")
        key: Option<String>,
    },

    /// I/O error (output directory creation, runtime construction, pipes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A process-pool worker could not be spawned or broke its protocol
    #[error("worker error: {0}")]
    Worker(String),

    /// The thread-pool strategy could not start its threads
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A blocking section of a strategy did not complete
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// The configuration key this error refers to, if any
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Error::Config { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_and_key() {
        let err = Error::config("requests", "must be a number");
        assert_eq!(err.to_string(), "configuration error: must be a number");
        assert_eq!(err.config_key(), Some("requests"));
    }

    #[test]
    fn test_non_config_errors_have_no_key() {
        let err = Error::Worker("spawn failed".into());
        assert_eq!(err.config_key(), None);
        assert_eq!(err.to_string(), "worker error: spawn failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse.into();
        assert!(err.to_string().starts_with("serialization error:"));
    }
}
