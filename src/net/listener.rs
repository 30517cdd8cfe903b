//! Listener bootstrap.
//!
//! # Responsibilities
//! - Decide which listeners run (plaintext, TLS, or both) from `ServerConfig`
//! - Load TLS material and bind every socket before serving anything
//! - Serve one shared container on all listeners until cancelled
//! - Shut the remaining listener down when one fails
//!
//! # Decision Table
//! ```text
//! insecure_port != 0                      → plaintext listener
//! secure_port != 0, cert and key set      → TLS listener
//! secure_port != 0, cert or key empty     → error, nothing bound
//! secure_port == 0, cert and key set      → warning, TLS not started
//! no listener enabled                     → error, nothing bound
//! ```

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::validation::{parse_bind_address, validate_server};
use crate::config::{ServerConfig, ValidationError};
use crate::net::tls::{load_tls_config, TlsError};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid listener configuration: {}", join(.0))]
    Config(Vec<ValidationError>),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("listener {listener} failed: {source}")]
    Serve {
        listener: SocketAddr,
        source: std::io::Error,
    },
    #[error("cannot resolve bind_address {host:?}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("listener task failed: {0}")]
    Task(#[from] JoinError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsListener {
    pub addr: SocketAddr,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// The listeners a server will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerPlan {
    pub plaintext: Option<SocketAddr>,
    pub tls: Option<TlsListener>,
    /// Drain bound for TLS connections after cancellation.
    pub grace: Duration,
}

impl ListenerPlan {
    /// Apply the decision table. Fails before anything is bound.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServeError> {
        let errors = validate_server(config);
        if !errors.is_empty() {
            return Err(ServeError::Config(errors));
        }
        let ip = resolve_bind_address(&config.bind_address).await?;

        let plaintext = (config.insecure_port != 0).then(|| SocketAddr::new(ip, config.insecure_port));
        let tls = (config.secure_port != 0).then(|| TlsListener {
            addr: SocketAddr::new(ip, config.secure_port),
            cert: PathBuf::from(&config.tls_cert_file),
            key: PathBuf::from(&config.tls_private_key_file),
        });

        if tls.is_none() && config.has_tls_material() {
            tracing::warn!(
                cert = %config.tls_cert_file,
                "TLS certificate configured but secure_port is 0; TLS listener not started"
            );
        }

        Ok(Self {
            plaintext,
            tls,
            grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    /// Bind every listener, then serve `container` until `token` is
    /// cancelled or a listener fails.
    pub async fn serve(self, container: Router, token: CancellationToken) -> Result<(), ServeError> {
        let tls = match self.tls {
            Some(listener) => {
                let config = load_tls_config(&listener.cert, &listener.key).await?;
                Some((bind(listener.addr)?, config))
            }
            None => None,
        };
        let plaintext = self.plaintext.map(bind).transpose()?;

        let child = token.child_token();
        let mut tasks = JoinSet::new();
        if let Some(listener) = plaintext {
            tasks.spawn(serve_plaintext(listener, container.clone(), child.clone()));
        }
        if let Some((listener, config)) = tls {
            tasks.spawn(serve_tls(listener, config, container, child.clone(), self.grace));
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(ServeError::from).and_then(|served| served);
            if let Err(e) = outcome {
                if result.is_ok() {
                    tracing::error!(error = %e, "Listener failed, stopping remaining listeners");
                    child.cancel();
                    result = Err(e);
                }
            }
        }
        result
    }
}

/// Start the listeners `config` enables and serve `container` on all of them.
pub async fn serve(config: &ServerConfig, container: Router, token: CancellationToken) -> Result<(), ServeError> {
    ListenerPlan::from_config(config).await?.serve(container, token).await
}

/// IP literals are used as is; host names go through the resolver.
async fn resolve_bind_address(bind_address: &str) -> Result<IpAddr, ServeError> {
    if let Some(ip) = parse_bind_address(bind_address) {
        return Ok(ip);
    }
    let host = bind_address.trim();
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| ServeError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ServeError::Config(vec![ValidationError::InvalidBindAddress(host.to_string())]))
}

fn bind(addr: SocketAddr) -> Result<std::net::TcpListener, ServeError> {
    let listener = std::net::TcpListener::bind(addr).map_err(|source| ServeError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServeError::Bind { addr, source })?;
    Ok(listener)
}

fn local_addr(listener: &std::net::TcpListener) -> Result<SocketAddr, ServeError> {
    listener.local_addr().map_err(|source| ServeError::Serve {
        listener: SocketAddr::from(([0, 0, 0, 0], 0)),
        source,
    })
}

async fn serve_plaintext(
    listener: std::net::TcpListener,
    container: Router,
    token: CancellationToken,
) -> Result<(), ServeError> {
    let addr = local_addr(&listener)?;
    let listener = tokio::net::TcpListener::from_std(listener).map_err(|source| ServeError::Serve {
        listener: addr,
        source,
    })?;

    tracing::info!(address = %addr, "Plaintext listener started");
    axum::serve(listener, container.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .map_err(|source| ServeError::Serve { listener: addr, source })?;
    tracing::info!(address = %addr, "Plaintext listener stopped");
    Ok(())
}

async fn serve_tls(
    listener: std::net::TcpListener,
    config: RustlsConfig,
    container: Router,
    token: CancellationToken,
    grace: Duration,
) -> Result<(), ServeError> {
    let addr = local_addr(&listener)?;
    let handle = Handle::new();
    let shutdown = {
        let handle = handle.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            handle.graceful_shutdown(Some(grace));
        })
    };

    tracing::info!(address = %addr, "TLS listener started");
    let served = axum_server::from_tcp_rustls(listener, config)
        .handle(handle)
        .serve(container.into_make_service_with_connect_info::<SocketAddr>())
        .await;
    shutdown.abort();

    served.map_err(|source| ServeError::Serve { listener: addr, source })?;
    tracing::info!(address = %addr, "TLS listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(insecure: u16, secure: u16, cert: &str, key: &str) -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1".into(),
            insecure_port: insecure,
            secure_port: secure,
            tls_cert_file: cert.into(),
            tls_private_key_file: key.into(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn insecure_only() {
        let plan = ListenerPlan::from_config(&server(9090, 0, "", "")).await.unwrap();
        assert_eq!(plan.plaintext, Some("127.0.0.1:9090".parse().unwrap()));
        assert!(plan.tls.is_none());
    }

    #[tokio::test]
    async fn both_listeners() {
        let plan = ListenerPlan::from_config(&server(9090, 8443, "c.pem", "k.pem")).await.unwrap();
        assert!(plan.plaintext.is_some());
        let tls = plan.tls.unwrap();
        assert_eq!(tls.addr.port(), 8443);
        assert_eq!(tls.cert, PathBuf::from("c.pem"));
    }

    #[tokio::test]
    async fn tls_only() {
        let plan = ListenerPlan::from_config(&server(0, 8443, "c.pem", "k.pem")).await.unwrap();
        assert!(plan.plaintext.is_none());
        assert!(plan.tls.is_some());
    }

    #[tokio::test]
    async fn certificate_without_secure_port_is_ignored() {
        let plan = ListenerPlan::from_config(&server(9090, 0, "c.pem", "k.pem")).await.unwrap();
        assert!(plan.tls.is_none());
    }

    #[tokio::test]
    async fn partial_tls_is_rejected() {
        let err = ListenerPlan::from_config(&server(9090, 8443, "c.pem", "")).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Config(ref errors) if errors.contains(&ValidationError::PartialTls {
                port: 8443,
                missing: "tls_private_key_file",
            })
        ));
    }

    #[tokio::test]
    async fn no_listener_is_rejected() {
        let err = ListenerPlan::from_config(&server(0, 0, "", "")).await.unwrap_err();
        assert!(matches!(err, ServeError::Config(ref errors) if errors.contains(&ValidationError::NoListeners)));
    }

    #[tokio::test]
    async fn host_name_bind_address_is_resolved() {
        let mut config = server(9090, 0, "", "");
        config.bind_address = "localhost".into();
        let plan = ListenerPlan::from_config(&config).await.unwrap();
        assert!(plan.plaintext.unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn missing_tls_files_fail_before_binding() {
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let config = server(port, port + 1, "/no/cert.pem", "/no/key.pem");
        let err = serve(&config, Router::new(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServeError::Tls(TlsError::Read { .. })));

        // Plaintext port was never taken.
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }
}
