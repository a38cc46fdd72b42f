//! The per-request fetch operation shared by every strategy
//!
//! A fetch issues one GET, checks the status, and then either stores the body
//! (image download) or pulls one field out of a JSON body (UUID fetch). Every
//! failure path resolves to [`FetchOutcome::Failure`]; nothing here returns an
//! error to the caller.
//!
//! Two entry points exist because strategies differ in how they wait on I/O:
//! [`fetch_blocking`] for the sequential, thread and process strategies and
//! [`fetch_async`] for the cooperative ones. Status handling, decoding and
//! logging are shared.

use crate::error::Result;
use crate::types::{FailureReason, FetchOutcome, Payload, RequestIndex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Placeholder in a target URL that is replaced by the request index
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// What to do with a successful response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extract {
    /// Write the body to `<dir>/image_<index>.jpg`
    Save {
        /// Strategy-specific output directory
        dir: PathBuf,
    },
    /// Decode the body as JSON and return one top-level field
    Field {
        /// Name of the field
        name: String,
    },
}

/// Everything a strategy (or a worker process) needs to perform its fetches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchJob {
    /// Target URL, optionally containing `{index}`
    pub target: String,
    /// Body handling
    pub extract: Extract,
}

impl FetchJob {
    /// URL for one request
    pub fn url_for(&self, index: RequestIndex) -> String {
        self.target
            .replace(INDEX_PLACEHOLDER, &index.get().to_string())
    }

    /// Destination file for one request, if this job stores bodies
    pub fn output_path(&self, index: RequestIndex) -> Option<PathBuf> {
        match &self.extract {
            Extract::Save { dir } => Some(dir.join(format!("image_{index}.jpg"))),
            Extract::Field { .. } => None,
        }
    }

    /// Create the output directory, if any. Must run before the first fetch.
    pub fn prepare(&self) -> Result<()> {
        if let Extract::Save { dir } = &self.extract {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Fetch one request on the calling thread
///
/// With `client = None` a fresh connection is opened for this single request
/// and dropped afterwards.
pub fn fetch_blocking(
    client: Option<&reqwest::blocking::Client>,
    job: &FetchJob,
    index: RequestIndex,
) -> FetchOutcome {
    let url = job.url_for(index);
    let sent = match client {
        Some(client) => client.get(&url).send(),
        None => reqwest::blocking::get(&url),
    };

    let outcome = match sent {
        Err(e) => FetchOutcome::Failure(FailureReason::Transport(e.to_string())),
        Ok(response) if !response.status().is_success() => {
            FetchOutcome::Failure(FailureReason::Status(response.status().as_u16()))
        }
        Ok(response) => match response.bytes() {
            Ok(body) => match &job.extract {
                Extract::Field { name } => extract_field(&body, name),
                Extract::Save { .. } => {
                    store_blocking(job.output_path(index).as_deref(), body.to_vec())
                }
            },
            Err(e) => FetchOutcome::Failure(FailureReason::Transport(e.to_string())),
        },
    };

    log_outcome(job, index, &outcome);
    outcome
}

/// Fetch one request, suspending at each I/O wait
pub async fn fetch_async(
    client: &reqwest::Client,
    job: &FetchJob,
    index: RequestIndex,
) -> FetchOutcome {
    let url = job.url_for(index);

    let outcome = match client.get(&url).send().await {
        Err(e) => FetchOutcome::Failure(FailureReason::Transport(e.to_string())),
        Ok(response) if !response.status().is_success() => {
            FetchOutcome::Failure(FailureReason::Status(response.status().as_u16()))
        }
        Ok(response) => match response.bytes().await {
            Ok(body) => match &job.extract {
                Extract::Field { name } => extract_field(&body, name),
                Extract::Save { .. } => {
                    store_async(job.output_path(index).as_deref(), body.to_vec()).await
                }
            },
            Err(e) => FetchOutcome::Failure(FailureReason::Transport(e.to_string())),
        },
    };

    log_outcome(job, index, &outcome);
    outcome
}

/// Decode a JSON body and pull out one top-level field
pub fn extract_field(body: &[u8], name: &str) -> FetchOutcome {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => return FetchOutcome::Failure(FailureReason::Decode(e.to_string())),
    };

    match value.get(name) {
        Some(serde_json::Value::String(s)) => FetchOutcome::Success(Payload::Field(s.clone())),
        Some(other) => FetchOutcome::Success(Payload::Field(other.to_string())),
        None if value.is_object() => {
            FetchOutcome::Failure(FailureReason::Decode(format!("missing field `{name}`")))
        }
        None => FetchOutcome::Failure(FailureReason::Decode(format!(
            "expected a JSON object with field `{name}`"
        ))),
    }
}

/// Write through a `.part` sibling and rename, so a visible file is always whole
pub fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    let written = std::fs::write(&partial, bytes).and_then(|()| std::fs::rename(&partial, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    written
}

/// Async counterpart of [`write_atomic_blocking`]
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, path).await
    }
    .await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    written
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn store_blocking(path: Option<&Path>, body: Vec<u8>) -> FetchOutcome {
    match path {
        Some(path) => match write_atomic_blocking(path, &body) {
            Ok(()) => FetchOutcome::Success(Payload::Bytes(body)),
            Err(e) => storage_failure(path, e),
        },
        None => FetchOutcome::Success(Payload::Bytes(body)),
    }
}

async fn store_async(path: Option<&Path>, body: Vec<u8>) -> FetchOutcome {
    match path {
        Some(path) => match write_atomic(path, &body).await {
            Ok(()) => FetchOutcome::Success(Payload::Bytes(body)),
            Err(e) => storage_failure(path, e),
        },
        None => FetchOutcome::Success(Payload::Bytes(body)),
    }
}

fn storage_failure(path: &Path, e: std::io::Error) -> FetchOutcome {
    FetchOutcome::Failure(FailureReason::Storage(format!(
        "{}: {}",
        path.display(),
        e
    )))
}

fn log_outcome(job: &FetchJob, index: RequestIndex, outcome: &FetchOutcome) {
    match (outcome, &job.extract) {
        (FetchOutcome::Success(payload), Extract::Save { .. }) => {
            tracing::info!(index = index.get(), bytes = payload.len(), "downloaded image");
        }
        (FetchOutcome::Success(payload), Extract::Field { name }) => {
            tracing::info!(index = index.get(), field = %name, value = ?payload.as_field(), "fetched field");
        }
        (FetchOutcome::Failure(reason), _) => {
            tracing::warn!(index = index.get(), reason = %reason, "fetch failed");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uuid_job(server: &MockServer) -> FetchJob {
        FetchJob {
            target: format!("{}/uuid/{{index}}", server.uri()),
            extract: Extract::Field {
                name: "uuid".into(),
            },
        }
    }

    #[test]
    fn test_url_for_substitutes_index() {
        let job = FetchJob {
            target: "http://localhost/item/{index}?again={index}".into(),
            extract: Extract::Field { name: "id".into() },
        };
        assert_eq!(
            job.url_for(RequestIndex(7)),
            "http://localhost/item/7?again=7"
        );

        let fixed = FetchJob {
            target: "http://localhost/uuid".into(),
            ..job
        };
        assert_eq!(fixed.url_for(RequestIndex(3)), "http://localhost/uuid");
    }

    #[test]
    fn test_output_path_naming() {
        let job = FetchJob {
            target: "http://localhost/img".into(),
            extract: Extract::Save {
                dir: PathBuf::from("out/sequential_cold"),
            },
        };
        assert_eq!(
            job.output_path(RequestIndex(12)),
            Some(PathBuf::from("out/sequential_cold/image_12.jpg"))
        );
    }

    #[test]
    fn test_extract_field_variants() {
        assert_eq!(
            extract_field(br#"{"uuid":"abc"}"#, "uuid"),
            FetchOutcome::Success(Payload::Field("abc".into()))
        );
        assert_eq!(
            extract_field(br#"{"uuid":42}"#, "uuid"),
            FetchOutcome::Success(Payload::Field("42".into()))
        );
        assert_eq!(
            extract_field(br#"{"id":"abc"}"#, "uuid"),
            FetchOutcome::Failure(FailureReason::Decode("missing field `uuid`".into()))
        );
        assert!(matches!(
            extract_field(b"<html>oops</html>", "uuid"),
            FetchOutcome::Failure(FailureReason::Decode(_))
        ));
        assert!(matches!(
            extract_field(b"[1,2]", "uuid"),
            FetchOutcome::Failure(FailureReason::Decode(_))
        ));
    }

    #[test]
    fn test_write_atomic_blocking_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("image_1.jpg");

        write_atomic_blocking(&target, b"jpeg").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg");
        assert!(!dir.path().join("image_1.jpg.part").exists());
    }

    #[test]
    fn test_write_atomic_blocking_missing_dir_fails_clean() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent").join("image_1.jpg");

        assert!(write_atomic_blocking(&target, b"jpeg").is_err());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_async() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("image_2.jpg");

        write_atomic(&target, b"bytes").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"bytes");
        assert!(!dir.path().join("image_2.jpg.part").exists());
    }

    #[test]
    fn test_prepare_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        let job = FetchJob {
            target: "http://localhost/img".into(),
            extract: Extract::Save { dir: out.clone() },
        };

        job.prepare().unwrap();
        assert!(out.is_dir());
    }

    #[tokio::test]
    async fn test_fetch_async_success_status_and_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uuid/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"uuid":"one"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/uuid/2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/uuid/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("garbage"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let job = uuid_job(&server);

        assert_eq!(
            fetch_async(&client, &job, RequestIndex(1)).await,
            FetchOutcome::Success(Payload::Field("one".into()))
        );
        assert_eq!(
            fetch_async(&client, &job, RequestIndex(2)).await,
            FetchOutcome::Failure(FailureReason::Status(503))
        );
        assert!(matches!(
            fetch_async(&client, &job, RequestIndex(3)).await,
            FetchOutcome::Failure(FailureReason::Decode(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_blocking_saves_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = FetchJob {
            target: format!("{}/img", server.uri()),
            extract: Extract::Save {
                dir: dir.path().to_path_buf(),
            },
        };

        let outcome = tokio::task::spawn_blocking(move || fetch_blocking(None, &job, RequestIndex(4)))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Success(Payload::Bytes(vec![0xFF, 0xD8, 0xFF])));
        assert_eq!(
            std::fs::read(dir.path().join("image_4.jpg")).unwrap(),
            vec![0xFF, 0xD8, 0xFF]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_blocking_storage_failure_is_captured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = FetchJob {
            target: format!("{}/img", server.uri()),
            extract: Extract::Save {
                dir: dir.path().join("never-created"),
            },
        };

        let outcome = tokio::task::spawn_blocking(move || {
            let client = reqwest::blocking::Client::new();
            fetch_blocking(Some(&client), &job, RequestIndex(1))
        })
        .await
        .unwrap();

        assert!(matches!(
            outcome,
            FetchOutcome::Failure(FailureReason::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_async_connection_refused_is_transport_failure() {
        // Bind then drop a listener to get a port nobody is serving
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let job = FetchJob {
            target: format!("http://127.0.0.1:{port}/uuid"),
            extract: Extract::Field {
                name: "uuid".into(),
            },
        };

        let outcome = fetch_async(&reqwest::Client::new(), &job, RequestIndex(1)).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(FailureReason::Transport(_))
        ));
    }
}
