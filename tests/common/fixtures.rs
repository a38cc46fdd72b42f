//! Mock targets and harness configuration shared by integration tests

use fetch_bench::{Config, PoolConfig, StrategyKind, TargetConfig, WorkerLauncher, WorkloadKind};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes served for every image request
pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg";

/// The built binary, used as the process-pool worker
pub fn worker_launcher() -> WorkerLauncher {
    WorkerLauncher::new(env!("CARGO_BIN_EXE_fetch-bench"))
}

/// Server answering every `/uuid` and `/uuid/<n>` with `{"uuid":"x"}` and
/// every `/image[/<n>]` with [`IMAGE_BYTES`]
pub async fn healthy_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/uuid(/\d+)?$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"uuid":"x"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/image(/\d+)?$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES.to_vec()))
        .mount(&server)
        .await;
    server
}

/// Server answering every `/uuid[/<n>]` with `{"uuid":"x"}` after `delay`
pub async fn slow_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/uuid(/\d+)?$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"uuid":"x"}"#)
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

/// Make one path answer with `status`, ahead of the healthy mocks
pub async fn fail_path(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Make one path answer 200 with a body that is not JSON
pub async fn garble_path(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"uuid\": "))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Config running every strategy against `server`, with per-index targets
pub fn config_for(server: &MockServer, requests: usize, output_root: &Path) -> Config {
    Config {
        requests,
        workloads: vec![WorkloadKind::Uuid],
        strategies: StrategyKind::ALL.to_vec(),
        targets: TargetConfig {
            image_url: format!("{}/image/{{index}}", server.uri()),
            uuid_url: format!("{}/uuid/{{index}}", server.uri()),
            output_root: output_root.to_path_buf(),
            ..Default::default()
        },
        pool: PoolConfig {
            thread_workers: 3,
            process_workers: Some(2),
        },
    }
}
