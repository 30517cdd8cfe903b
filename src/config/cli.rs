//! Command-line flags.
//!
//! Flags override values from the optional config file; anything not given
//! on either keeps its default.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{Config, SourceMode};
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "api-server", version)]
#[command(
    about = "REST control-plane server that serves cluster state from synchronized caches",
    long_about = "Mirrors the configured resource collections from the backing store and \
                  only starts answering requests once every cache has completed its initial sync."
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Interface to listen on (IP address or host name)
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Plaintext HTTP port, 0 disables
    #[arg(long)]
    pub insecure_port: Option<u16>,

    /// TLS port, 0 disables
    #[arg(long)]
    pub secure_port: Option<u16>,

    /// TLS certificate (PEM)
    #[arg(long)]
    pub tls_cert_file: Option<String>,

    /// TLS private key (PEM)
    #[arg(long)]
    pub tls_private_key_file: Option<String>,

    /// Backing store implementation
    #[arg(long, value_enum)]
    pub source: Option<SourceMode>,

    /// Base URL of the backing store API
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token file for the backing store
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Log filter (e.g. "info", "api_server=debug")
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Resolve the effective configuration: file, then flags, then validation.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overwrite config values with every flag that was given.
    pub fn apply(&self, config: &mut Config) {
        let server = &mut config.server;
        if let Some(v) = &self.bind_address {
            server.bind_address = v.clone();
        }
        if let Some(v) = self.insecure_port {
            server.insecure_port = v;
        }
        if let Some(v) = self.secure_port {
            server.secure_port = v;
        }
        if let Some(v) = &self.tls_cert_file {
            server.tls_cert_file = v.clone();
        }
        if let Some(v) = &self.tls_private_key_file {
            server.tls_private_key_file = v.clone();
        }

        let source = &mut config.source;
        if let Some(v) = self.source {
            source.mode = v;
        }
        if let Some(v) = &self.api_url {
            source.api_url = v.clone();
        }
        if let Some(v) = &self.token_file {
            source.token_file = Some(v.clone());
        }

        if let Some(v) = &self.log_level {
            config.observability.log_level = v.clone();
        }
    }
}
