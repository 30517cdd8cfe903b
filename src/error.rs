//! Top-level error type.
//!
//! Subsystems keep their own error enums; this is the one `main` sees.

use std::path::PathBuf;

use crate::cache::SyncError;
use crate::config::ConfigError;
use crate::lifecycle::signals::SignalError;
use crate::net::ServeError;
use crate::observability::logging::LoggingError;
use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Serve(#[from] ServeError),
    #[error("cache sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("backing store client: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("cannot read token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid source.api_url: {0}")]
    ApiUrl(#[from] url::ParseError),
}
