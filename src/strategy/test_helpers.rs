//! Shared mock-server fixtures for strategy tests

use crate::fetch::{Extract, FetchJob};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Bytes served by the image mock
pub(crate) const IMAGE_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

/// Answers `/uuid/<n>` with `{"uuid": "uuid-<n>"}`
struct EchoIndex {
    delay: Duration,
}

impl Respond for EchoIndex {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let index = request.url.path().rsplit('/').next().unwrap_or_default();
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ "uuid": format!("uuid-{index}") }))
            .set_delay(self.delay)
    }
}

pub(crate) async fn uuid_server() -> MockServer {
    slow_uuid_server(Duration::ZERO).await
}

/// Like [`uuid_server`], but every response is held back for `delay`
pub(crate) async fn slow_uuid_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/uuid/\d+$"))
        .respond_with(EchoIndex { delay })
        .mount(&server)
        .await;
    server
}

pub(crate) async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/image/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES.to_vec()))
        .mount(&server)
        .await;
    server
}

/// Override one path with a fixed status, taking precedence over the catch-all mocks
pub(crate) async fn fail_path(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Override one path with a body that is not JSON
pub(crate) async fn garble_path(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .with_priority(1)
        .mount(server)
        .await;
}

pub(crate) fn uuid_job(server: &MockServer) -> FetchJob {
    FetchJob {
        target: format!("{}/uuid/{{index}}", server.uri()),
        extract: Extract::Field {
            name: "uuid".into(),
        },
    }
}

pub(crate) fn image_job(server: &MockServer, dir: &Path) -> FetchJob {
    FetchJob {
        target: format!("{}/image/{{index}}", server.uri()),
        extract: Extract::Save {
            dir: dir.to_path_buf(),
        },
    }
}

/// `uuid-1 .. uuid-n`, as a batch would report them
pub(crate) fn expected_uuids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("uuid-{i}")).collect()
}

pub(crate) fn fields(batch: &crate::types::BatchOutcome) -> Vec<String> {
    batch
        .fields()
        .into_iter()
        .map(|f| f.unwrap_or("<failed>").to_string())
        .collect()
}
