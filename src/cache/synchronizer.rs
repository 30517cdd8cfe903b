//! Per-kind cache synchronizer.
//!
//! # Replay loop
//! ```text
//! loop {
//!     open watch            (changes from now on are buffered by the stream)
//!     list collection       → Snapshot { version, items }
//!     replace mirror        (readers see the snapshot)
//!     drain buffered events (only those newer than the snapshot)
//!     mark synchronized     (first time only)
//!     apply live events until the watch ends, fails, or resync is due
//!     on failure: back off, retry forever
//! }
//! ```

use futures_util::{FutureExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::cache::{Resource, ResourceKind, Store, WatchEvent};
use crate::config::SyncConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::source::{ResourceSource, SourceError, WatchStream};

/// Mirrors one collection of the backing store.
pub struct ResourceCacheSynchronizer {
    kind: ResourceKind,
    source: Arc<dyn ResourceSource>,
    config: SyncConfig,
    store: Store,
    synchronized: Arc<AtomicBool>,
    started: AtomicBool,
    tasks: TaskTracker,
}

impl ResourceCacheSynchronizer {
    pub fn new(kind: ResourceKind, source: Arc<dyn ResourceSource>, config: SyncConfig) -> Self {
        Self {
            kind,
            source,
            config,
            store: Store::new(),
            synchronized: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            tasks: TaskTracker::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Launch the replay loop in the background. Returns immediately.
    ///
    /// The loop runs until `token` is cancelled. Starting twice is a no-op.
    pub fn start(&self, token: CancellationToken) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(kind = %self.kind, "Synchronizer already started");
            return;
        }

        let replay = Replay {
            kind: self.kind,
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            synchronized: Arc::clone(&self.synchronized),
            backoff: Backoff::new(self.config.backoff_base_ms, self.config.backoff_max_ms),
            resync_period: self.config.resync_period(),
        };
        self.tasks.spawn(replay.run(token));
        self.tasks.close();
    }

    /// Whether the initial list has been fully applied to the mirror.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::SeqCst)
    }

    /// Look up an object by `namespace/name` (or `name` for cluster-scoped kinds).
    pub fn get(&self, key: &str) -> Option<Resource> {
        self.store.get(key)
    }

    pub fn list(&self) -> Vec<Resource> {
        self.store.list()
    }

    pub fn list_namespace(&self, namespace: &str) -> Vec<Resource> {
        self.store.list_namespace(namespace)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Wait for the replay loop to exit after cancellation.
    ///
    /// Resolves immediately if the synchronizer was never started.
    pub async fn wait_stopped(&self) {
        if self.started.load(Ordering::SeqCst) {
            self.tasks.wait().await;
        }
    }
}

impl std::fmt::Debug for ResourceCacheSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCacheSynchronizer")
            .field("kind", &self.kind)
            .field("synchronized", &self.is_synchronized())
            .field("items", &self.store.len())
            .finish()
    }
}

/// State owned by the background task.
struct Replay {
    kind: ResourceKind,
    source: Arc<dyn ResourceSource>,
    store: Store,
    synchronized: Arc<AtomicBool>,
    backoff: Backoff,
    resync_period: Option<Duration>,
}

impl Replay {
    async fn run(mut self, token: CancellationToken) {
        tracing::debug!(kind = %self.kind, "Replay loop starting");

        loop {
            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = self.list_and_watch() => result,
            };

            let delay = match result {
                Ok(()) => {
                    tracing::debug!(kind = %self.kind, "Resync period elapsed, relisting");
                    continue;
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    metrics::record_sync_failure(self.kind);
                    tracing::warn!(
                        kind = %self.kind,
                        attempt = self.backoff.attempt(),
                        retry_in_ms = delay.as_millis() as u64,
                        synchronized = self.synchronized.load(Ordering::SeqCst),
                        error = %e,
                        "Cache sync interrupted"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!(kind = %self.kind, "Replay loop stopped");
    }

    /// One list+watch cycle.
    ///
    /// Returns `Ok` when a periodic resync is due and `Err` when the source
    /// failed or the watch ended.
    async fn list_and_watch(&mut self) -> Result<(), SourceError> {
        // Watch before listing so nothing that happens during the list is lost.
        let mut watch = self.source.watch(self.kind).await?;
        let snapshot = self.source.list(self.kind).await?;
        self.backoff.reset();

        let mut last_version = snapshot.version;
        let listed = snapshot.items.len();
        self.store.replace(snapshot.items);

        let Drained { replayed, interrupted } = self.drain_buffered(&mut watch, &mut last_version);

        if !self.synchronized.swap(true, Ordering::SeqCst) {
            metrics::record_cache_synced(self.kind, self.store.len());
            tracing::info!(
                kind = %self.kind,
                items = listed,
                replayed,
                version = last_version,
                "Cache synchronized"
            );
        } else {
            tracing::debug!(kind = %self.kind, items = listed, replayed, "Cache relisted");
        }

        // Snapshot and buffered events are applied; a watch that ended
        // during the drain only forces a relist.
        if let Some(e) = interrupted {
            return Err(e);
        }

        let period = self.resync_period;
        let resync = async move {
            match period {
                Some(period) => tokio::time::sleep(period).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(resync);

        loop {
            tokio::select! {
                _ = &mut resync => return Ok(()),
                next = watch.next() => match next {
                    Some(Ok(event)) => {
                        apply_newer(&self.store, event, &mut last_version);
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(SourceError::Watch("watch stream closed".into())),
                },
            }
        }
    }

    /// Apply every event already waiting in the watch stream.
    fn drain_buffered(&self, watch: &mut WatchStream, last_version: &mut u64) -> Drained {
        let mut replayed = 0;
        let interrupted = loop {
            match watch.next().now_or_never() {
                None => break None,
                Some(None) => break Some(SourceError::Watch("watch stream closed".into())),
                Some(Some(Err(e))) => break Some(e),
                Some(Some(Ok(event))) => {
                    if apply_newer(&self.store, event, last_version) {
                        replayed += 1;
                    }
                }
            }
        };
        Drained { replayed, interrupted }
    }
}

/// Outcome of draining the buffered part of a watch.
struct Drained {
    replayed: usize,
    /// Set when the watch ended or failed while draining.
    interrupted: Option<SourceError>,
}

/// Apply `event` unless the mirror already reflects its revision.
///
/// Events without a revision (0) are always applied.
fn apply_newer(store: &Store, event: WatchEvent, last_version: &mut u64) -> bool {
    let version = event.version();
    if version != 0 && version <= *last_version {
        return false;
    }
    *last_version = (*last_version).max(version);
    store.apply(event);
    true
}
