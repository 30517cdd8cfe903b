//! Startup gate over every registered synchronizer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::{ResourceCacheSynchronizer, ResourceKind};
use crate::config::SyncConfig;

/// Why the barrier did not release.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Shutdown was requested while caches were still syncing.
    #[error("cache sync cancelled by shutdown")]
    Cancelled,
    /// The configured startup bound elapsed first.
    #[error("caches not synced after {elapsed:?}: {pending:?}")]
    TimedOut {
        elapsed: Duration,
        pending: Vec<ResourceKind>,
    },
}

/// Read-only handles to every synchronized cache, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct Caches {
    inner: Arc<BTreeMap<ResourceKind, Arc<ResourceCacheSynchronizer>>>,
}

impl Caches {
    /// Handles over synchronizers that may still be syncing.
    pub(crate) fn from_synchronizers(synchronizers: impl IntoIterator<Item = Arc<ResourceCacheSynchronizer>>) -> Self {
        let inner = synchronizers.into_iter().map(|s| (s.kind(), s)).collect();
        Self { inner: Arc::new(inner) }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Arc<ResourceCacheSynchronizer>> {
        self.inner.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceCacheSynchronizer>> {
        self.inner.values()
    }

    pub fn all_synchronized(&self) -> bool {
        self.inner.values().all(|s| s.is_synchronized())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Wait for every replay loop to exit after the shutdown token fired.
    pub async fn wait_stopped(&self) {
        for sync in self.inner.values() {
            sync.wait_stopped().await;
        }
    }
}

/// Successful barrier release.
#[derive(Debug, Clone)]
pub struct Ready {
    pub caches: Caches,
    pub elapsed: Duration,
}

/// Blocks startup until every registered cache has synced.
///
/// Registration is only possible before `run`, which consumes the barrier.
pub struct SyncBarrier {
    synchronizers: Vec<Arc<ResourceCacheSynchronizer>>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl SyncBarrier {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            synchronizers: Vec::new(),
            poll_interval,
            timeout: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.poll_interval()).with_timeout(config.timeout())
    }

    /// Give up with `SyncError::TimedOut` after `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a synchronizer and get a handle to it.
    ///
    /// A kind registered twice keeps its first synchronizer.
    pub fn register(&mut self, synchronizer: ResourceCacheSynchronizer) -> Arc<ResourceCacheSynchronizer> {
        if let Some(existing) = self.synchronizers.iter().find(|s| s.kind() == synchronizer.kind()) {
            tracing::warn!(kind = %synchronizer.kind(), "Kind already registered, keeping first synchronizer");
            return Arc::clone(existing);
        }
        let synchronizer = Arc::new(synchronizer);
        self.synchronizers.push(Arc::clone(&synchronizer));
        synchronizer
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.synchronizers.iter().map(|s| s.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }

    /// Start every synchronizer and wait until all report synchronized.
    ///
    /// Returns `Cancelled` as soon as `token` fires, never a partial result.
    pub async fn run(self, token: CancellationToken) -> Result<Ready, SyncError> {
        let started = Instant::now();
        for sync in &self.synchronizers {
            sync.start(token.clone());
        }
        tracing::info!(kinds = self.synchronizers.len(), "Waiting for caches to sync");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            if token.is_cancelled() {
                tracing::info!("Shutdown requested, abandoning cache sync");
                return Err(SyncError::Cancelled);
            }

            // Flags never revert, so all-true now means all-true at release.
            let pending = self.pending();
            if pending.is_empty() {
                let elapsed = started.elapsed();
                tracing::info!(
                    kinds = self.synchronizers.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Resources sync success"
                );
                return Ok(Ready {
                    caches: Caches::from_synchronizers(self.synchronizers),
                    elapsed,
                });
            }
            tracing::debug!(pending = pending.len(), first = %pending[0], "Caches still syncing");

            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = &mut deadline => {
                    let elapsed = started.elapsed();
                    tracing::error!(elapsed_ms = elapsed.as_millis() as u64, pending = ?pending, "Cache sync timed out");
                    return Err(SyncError::TimedOut { elapsed, pending });
                }
                _ = ticker.tick() => {}
            }
        }
    }

    fn pending(&self) -> Vec<ResourceKind> {
        self.synchronizers
            .iter()
            .filter(|s| !s.is_synchronized())
            .map(|s| s.kind())
            .collect()
    }
}
