//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency by method
//! - `cache_synchronized` (gauge): 1 once a kind's cache has synced
//! - `cache_items` (gauge): objects in a cache at sync time
//! - `cache_sync_failures_total` (counter): interrupted list/watch cycles by kind

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::ResourceKind;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, latency: Duration) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string()).record(latency.as_secs_f64());
}

pub fn record_cache_synced(kind: ResourceKind, items: usize) {
    gauge!("cache_synchronized", "kind" => kind.as_str()).set(1.0);
    gauge!("cache_items", "kind" => kind.as_str()).set(items as f64);
}

pub fn record_sync_failure(kind: ResourceKind) {
    counter!("cache_sync_failures_total", "kind" => kind.as_str()).increment(1);
}
