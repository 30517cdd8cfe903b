//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::ResourceKind;

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listener configuration (bind address, ports, TLS).
    pub server: ServerConfig,

    /// Cache synchronization settings.
    pub sync: SyncConfig,

    /// Backing store the caches mirror.
    pub source: SourceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on (e.g., "0.0.0.0", "::1").
    pub bind_address: String,

    /// Plaintext HTTP port. 0 disables the plaintext listener.
    pub insecure_port: u16,

    /// TLS port. 0 disables the TLS listener.
    pub secure_port: u16,

    /// Path to certificate file (PEM).
    pub tls_cert_file: String,

    /// Path to private key file (PEM).
    pub tls_private_key_file: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long TLS connections may drain after shutdown is requested.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            insecure_port: 9090,
            secure_port: 0,
            tls_cert_file: String::new(),
            tls_private_key_file: String::new(),
            request_timeout_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Both PEM paths are present.
    pub fn has_tls_material(&self) -> bool {
        !self.tls_cert_file.is_empty() && !self.tls_private_key_file.is_empty()
    }
}

/// Cache synchronization configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// How often the startup barrier checks the caches, in milliseconds.
    pub poll_interval_ms: u64,

    /// First retry delay after a backing-store failure, in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound on the retry delay, in milliseconds.
    pub backoff_max_ms: u64,

    /// Full relist period in seconds. 0 disables periodic resync.
    pub resync_period_secs: u64,

    /// Give up on startup after this many seconds. 0 waits forever.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            backoff_base_ms: 200,
            backoff_max_ms: 30_000,
            resync_period_secs: 0,
            timeout_secs: 0,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_secs > 0).then(|| Duration::from_secs(self.resync_period_secs))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Which backing store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Kubernetes-style HTTP list/watch API.
    Kube,
    /// In-process store with no external dependency.
    Memory,
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub mode: SourceMode,

    /// Base URL of the API server (kube mode).
    pub api_url: String,

    /// File holding a bearer token for the API server.
    pub token_file: Option<PathBuf>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Kinds mirrored before serving.
    pub kinds: Vec<ResourceKind>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Kube,
            api_url: "http://127.0.0.1:8001".to_string(),
            token_file: None,
            connect_timeout_secs: 5,
            kinds: ResourceKind::ALL.to_vec(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.insecure_port, 9090);
        assert_eq!(config.server.secure_port, 0);
        assert_eq!(config.source.mode, SourceMode::Kube);
        assert_eq!(config.source.kinds.len(), ResourceKind::ALL.len());
        assert_eq!(config.sync.resync_period(), None);
        assert_eq!(config.sync.timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            secure_port = 8443
            tls_cert_file = "/etc/tls/cert.pem"
            tls_private_key_file = "/etc/tls/key.pem"

            [source]
            mode = "memory"
            kinds = ["Namespace", "Pod"]

            [sync]
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.server.insecure_port, 9090);
        assert!(config.server.has_tls_material());
        assert_eq!(config.source.mode, SourceMode::Memory);
        assert_eq!(config.source.kinds, vec![ResourceKind::Namespace, ResourceKind::Pod]);
        assert_eq!(config.sync.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(100));
    }
}
