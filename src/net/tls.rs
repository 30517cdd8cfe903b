//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no PEM certificate found in {0}")]
    NoCertificate(PathBuf),
    #[error("no PEM private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("invalid PEM in {path}: {source}")]
    Pem {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("rejected certificate/key pair: {0}")]
    Rustls(std::io::Error),
}

/// Load TLS configuration from certificate and key files.
///
/// Both files are read and checked up front so that a bad path surfaces
/// before any socket is bound.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let cert = read(cert_path).await?;
    let key = read(key_path).await?;

    let certs = rustls_pemfile::certs(&mut cert.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: cert_path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(cert_path.to_path_buf()));
    }

    let has_key = rustls_pemfile::private_key(&mut key.as_slice())
        .map_err(|source| TlsError::Pem {
            path: key_path.to_path_buf(),
            source,
        })?
        .is_some();
    if !has_key {
        return Err(TlsError::NoPrivateKey(key_path.to_path_buf()));
    }

    tracing::debug!(
        cert = %cert_path.display(),
        certificates = certs.len(),
        "TLS material loaded"
    );

    RustlsConfig::from_pem(cert, key).await.map_err(TlsError::Rustls)
}

async fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}
