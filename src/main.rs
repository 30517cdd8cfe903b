//! Control-plane API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                      API SERVER                       │
//!                   │                                                       │
//!  backing store    │  ┌────────────┐   ┌──────────────┐   ┌─────────────┐  │
//!  ─────────────────┼─▶│   source   │──▶│ synchronizer │──▶│ SyncBarrier │  │
//!  list + watch     │  │ kube/memory│   │  (per kind)  │   │  (startup)  │  │
//!                   │  └────────────┘   └──────────────┘   └──────┬──────┘  │
//!                   │                                             │ Ready   │
//!                   │                                             ▼         │
//!  Client Request   │  ┌────────────┐   ┌──────────────┐   ┌─────────────┐  │
//!  ─────────────────┼─▶│    net     │──▶│   logging    │──▶│  container  │  │
//!  plaintext / TLS  │  │ listeners  │   │  middleware  │   │  (routes)   │  │
//!                   │  └────────────┘   └──────────────┘   └─────────────┘  │
//!                   │                                                       │
//!                   │  config · observability · lifecycle (signals)         │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::process::ExitCode;

use api_server::config::Cli;
use api_server::lifecycle::{startup, ShutdownSignal};
use api_server::observability::{logging, metrics};
use api_server::ServerError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("api-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("api-server: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "api-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: api_server::Config) -> Result<(), ServerError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        insecure_port = config.server.insecure_port,
        secure_port = config.server.secure_port,
        source = ?config.source.mode,
        kinds = config.source.kinds.len(),
        "api-server starting"
    );

    let signal = ShutdownSignal::install()?;

    if config.observability.metrics_enabled {
        // Validated at load time.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr)?;
        }
    }

    startup::run(config, signal.token()).await
}
