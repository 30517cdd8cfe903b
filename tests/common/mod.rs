//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use api_server::config::{Config, SourceMode};
use api_server::ResourceKind;

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Loopback config serving plaintext on `port` from an in-memory store.
#[allow(dead_code)]
pub fn loopback_config(port: u16, kinds: &[ResourceKind]) -> Config {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1".into();
    config.server.insecure_port = port;
    config.server.shutdown_grace_secs = 1;
    config.source.mode = SourceMode::Memory;
    config.source.kinds = kinds.to_vec();
    config.sync.poll_interval_ms = 10;
    config.sync.backoff_base_ms = 10;
    config.sync.backoff_max_ms = 50;
    config
}

/// Poll `addr` until it accepts a connection.
#[allow(dead_code)]
pub async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..200 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("listener {addr} never came up");
}

/// HTTP client that never pools connections between requests.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Client for the self-signed test certificate.
#[allow(dead_code)]
pub fn tls_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Self-signed certificate and key for 127.0.0.1 / localhost.
#[allow(dead_code)]
pub fn tls_fixture() -> (String, String) {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    (format!("{dir}/server.crt"), format!("{dir}/server.key"))
}
