//! Startup orchestration.
//!
//! # Responsibilities
//! - Check the listener configuration before anything else happens
//! - Build the backing-store client
//! - Start one synchronizer per configured kind and wait for all of them
//! - Serve the container only after every cache has synced
//! - Stop the synchronizers once the listeners have drained
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Shutdown before the caches sync is not an error
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cache::{ResourceCacheSynchronizer, SyncBarrier, SyncError};
use crate::config::{Config, SourceConfig, SourceMode};
use crate::error::ServerError;
use crate::http::build_container;
use crate::net::ListenerPlan;
use crate::source::{KubeSource, MemorySource, ResourceSource};

/// Run the server until `token` is cancelled or something fatal happens.
pub async fn run(config: Config, token: CancellationToken) -> Result<(), ServerError> {
    let plan = ListenerPlan::from_config(&config.server).await?;
    let source = build_source(&config.source).await?;
    serve_when_synced(config, plan, source, token).await
}

/// Same as [`run`], over an already constructed backing store.
pub async fn run_with_source(
    config: Config,
    source: Arc<dyn ResourceSource>,
    token: CancellationToken,
) -> Result<(), ServerError> {
    let plan = ListenerPlan::from_config(&config.server).await?;
    serve_when_synced(config, plan, source, token).await
}

/// Backing store selected by `config.mode`.
pub async fn build_source(config: &SourceConfig) -> Result<Arc<dyn ResourceSource>, ServerError> {
    match config.mode {
        SourceMode::Memory => {
            tracing::warn!("Using in-memory backing store, caches start empty");
            Ok(Arc::new(MemorySource::new()))
        }
        SourceMode::Kube => {
            let base = Url::parse(&config.api_url)?;
            let bearer = match &config.token_file {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| ServerError::TokenFile {
                            path: path.clone(),
                            source,
                        })?;
                    Some(raw.trim().to_string())
                }
                None => None,
            };
            let source = KubeSource::new(base, bearer, Duration::from_secs(config.connect_timeout_secs))?;
            tracing::info!(api_url = %config.api_url, "Using Kubernetes API backing store");
            Ok(Arc::new(source))
        }
    }
}

async fn serve_when_synced(
    config: Config,
    plan: ListenerPlan,
    source: Arc<dyn ResourceSource>,
    token: CancellationToken,
) -> Result<(), ServerError> {
    let mut barrier = SyncBarrier::from_config(&config.sync);
    for kind in &config.source.kinds {
        barrier.register(ResourceCacheSynchronizer::new(
            *kind,
            Arc::clone(&source),
            config.sync.clone(),
        ));
    }

    let caches_token = token.child_token();
    let ready = match barrier.run(caches_token.clone()).await {
        Ok(ready) => ready,
        Err(SyncError::Cancelled) => {
            tracing::info!("Shutdown requested before caches synced");
            return Ok(());
        }
        Err(e) => {
            caches_token.cancel();
            return Err(e.into());
        }
    };

    let container = build_container(ready.caches.clone(), &config.server);
    let served = plan.serve(container, token).await;

    caches_token.cancel();
    ready.caches.wait_stopped().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;
    use crate::net::ServeError;

    #[tokio::test]
    async fn listener_config_is_checked_before_the_source() {
        let mut config = Config::default();
        config.server.insecure_port = 0;
        config.source.api_url = "not a url".into();

        let err = run(config, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Serve(ServeError::Config(ref errors)) if errors.contains(&ValidationError::NoListeners)
        ));
    }

    #[tokio::test]
    async fn missing_token_file_is_fatal() {
        let config = SourceConfig {
            token_file: Some("/no/such/token".into()),
            ..SourceConfig::default()
        };
        let err = build_source(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::TokenFile { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_sync_is_clean() {
        let source = MemorySource::new();
        source.set_available(false);
        let token = CancellationToken::new();
        token.cancel();

        let result = run_with_source(Config::default(), Arc::new(source), token).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn sync_timeout_is_fatal() {
        let source = MemorySource::new();
        source.set_available(false);
        let mut config = Config::default();
        config.sync.timeout_secs = 1;

        let err = run_with_source(config, Arc::new(source), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Sync(SyncError::TimedOut { .. })));
    }
}
