//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Listener decision table: at least one listener, no half-configured TLS
//! - Value ranges (poll interval > 0, parsable addresses and URLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before any listener binds or any cache starts

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use url::{Host, Url};

use crate::config::schema::{Config, ServerConfig, SourceMode, SyncConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no listener enabled: set insecure_port or secure_port with tls_cert_file and tls_private_key_file")]
    NoListeners,
    #[error("secure_port {port} is set but {missing} is empty")]
    PartialTls { port: u16, missing: &'static str },
    #[error("invalid bind_address {0:?}")]
    InvalidBindAddress(String),
    #[error("insecure_port and secure_port are both {0}")]
    PortConflict(u16),
    #[error("source.api_url is required in kube mode")]
    MissingApiUrl,
    #[error("invalid source.api_url {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("source.kinds is empty")]
    NoKinds,
    #[error("sync.poll_interval_ms must be greater than 0")]
    ZeroPollInterval,
    #[error("sync.backoff_base_ms must be greater than 0")]
    ZeroBackoff,
    #[error("invalid observability.metrics_address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate a whole configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_server(&config.server);
    errors.extend(validate_sync(&config.sync));

    if config.source.kinds.is_empty() {
        errors.push(ValidationError::NoKinds);
    }
    if config.source.mode == SourceMode::Kube {
        if config.source.api_url.is_empty() {
            errors.push(ValidationError::MissingApiUrl);
        } else if let Err(e) = Url::parse(&config.source.api_url) {
            errors.push(ValidationError::InvalidApiUrl {
                url: config.source.api_url.clone(),
                reason: e.to_string(),
            });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Listener checks, in decision-table order.
pub fn validate_server(server: &ServerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !is_valid_bind_address(&server.bind_address) {
        errors.push(ValidationError::InvalidBindAddress(server.bind_address.clone()));
    }

    if server.secure_port != 0 {
        if server.tls_cert_file.is_empty() {
            errors.push(ValidationError::PartialTls {
                port: server.secure_port,
                missing: "tls_cert_file",
            });
        }
        if server.tls_private_key_file.is_empty() {
            errors.push(ValidationError::PartialTls {
                port: server.secure_port,
                missing: "tls_private_key_file",
            });
        }
        if server.secure_port == server.insecure_port {
            errors.push(ValidationError::PortConflict(server.secure_port));
        }
    }

    if server.insecure_port == 0 && server.secure_port == 0 {
        errors.push(ValidationError::NoListeners);
    }

    errors
}

fn validate_sync(sync: &SyncConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if sync.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if sync.backoff_base_ms == 0 {
        errors.push(ValidationError::ZeroBackoff);
    }
    errors
}

/// IP literal, or a host name resolved when the listeners bind.
pub fn is_valid_bind_address(bind_address: &str) -> bool {
    parse_bind_address(bind_address).is_some() || matches!(Host::parse(bind_address.trim()), Ok(Host::Domain(_)))
}

/// Parse the interface part of a listen address. Empty means all IPv4 interfaces.
pub fn parse_bind_address(bind_address: &str) -> Option<IpAddr> {
    let trimmed = bind_address.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(insecure_port: u16, secure_port: u16, cert: &str, key: &str) -> ServerConfig {
        ServerConfig {
            insecure_port,
            secure_port,
            tls_cert_file: cert.to_string(),
            tls_private_key_file: key.to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn plaintext_only_is_valid() {
        assert!(validate_server(&server(8080, 0, "", "")).is_empty());
    }

    #[test]
    fn tls_only_is_valid() {
        assert!(validate_server(&server(0, 8443, "cert.pem", "key.pem")).is_empty());
    }

    #[test]
    fn no_listener_is_rejected() {
        assert_eq!(validate_server(&server(0, 0, "", "")), vec![ValidationError::NoListeners]);
        // PEM paths alone do not enable TLS.
        assert_eq!(
            validate_server(&server(0, 0, "cert.pem", "key.pem")),
            vec![ValidationError::NoListeners]
        );
    }

    #[test]
    fn partial_tls_is_rejected() {
        let errors = validate_server(&server(8080, 8443, "cert.pem", ""));
        assert_eq!(
            errors,
            vec![ValidationError::PartialTls {
                port: 8443,
                missing: "tls_private_key_file"
            }]
        );

        let errors = validate_server(&server(0, 8443, "", ""));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn same_port_twice_is_rejected() {
        let errors = validate_server(&server(8443, 8443, "cert.pem", "key.pem"));
        assert_eq!(errors, vec![ValidationError::PortConflict(8443)]);
    }

    #[test]
    fn bind_addresses() {
        assert_eq!(parse_bind_address(""), Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(parse_bind_address("127.0.0.1").is_some());
        assert!(parse_bind_address("[::1]").is_some());
        assert!(parse_bind_address("not-an-ip").is_none());
    }

    #[test]
    fn host_names_are_valid_bind_addresses() {
        assert!(is_valid_bind_address("localhost"));
        assert!(is_valid_bind_address("api.internal"));
        assert!(is_valid_bind_address("[::1]"));
        assert!(!is_valid_bind_address("not a host"));
        assert!(validate_server(&ServerConfig {
            bind_address: "localhost".into(),
            ..ServerConfig::default()
        })
        .is_empty());
    }

    #[test]
    fn collects_every_error() {
        let mut config = Config::default();
        config.server = server(0, 0, "", "");
        config.server.bind_address = "not a host".into();
        config.source.api_url = String::new();
        config.sync.poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoListeners));
        assert!(errors.contains(&ValidationError::InvalidBindAddress("not a host".into())));
        assert!(errors.contains(&ValidationError::MissingApiUrl));
        assert!(errors.contains(&ValidationError::ZeroPollInterval));
    }

    #[test]
    fn memory_mode_needs_no_url() {
        let mut config = Config::default();
        config.source.mode = SourceMode::Memory;
        config.source.api_url = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
