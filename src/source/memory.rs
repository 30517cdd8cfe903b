//! In-process backing store.
//!
//! Holds every collection in memory behind a single revision counter, so it
//! behaves like a real store for the synchronizer: lists carry a revision,
//! watches deliver changes in revision order. Used in offline mode and tests.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::cache::{object_key, Resource, ResourceKind, Snapshot, WatchEvent};
use crate::source::{ResourceSource, SourceError, WatchStream};

const WATCH_BUFFER: usize = 1024;

#[derive(Default)]
struct Collections {
    revision: u64,
    objects: HashMap<ResourceKind, HashMap<String, Resource>>,
}

/// Shared in-memory store. Clones refer to the same collections.
#[derive(Clone)]
pub struct MemorySource {
    state: Arc<Mutex<Collections>>,
    events: broadcast::Sender<WatchEvent>,
    available: Arc<AtomicBool>,
    lists: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            state: Arc::new(Mutex::new(Collections::default())),
            events,
            available: Arc::new(AtomicBool::new(true)),
            lists: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // A panic while holding the lock leaves the maps consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or replace an object, returning it with its new revision.
    pub fn upsert(&self, kind: ResourceKind, namespace: Option<&str>, name: &str, object: Value) -> Resource {
        let mut state = self.lock();
        state.revision += 1;
        let resource = Resource {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            version: state.revision,
            object,
        };
        let previous = state
            .objects
            .entry(kind)
            .or_default()
            .insert(resource.key(), resource.clone());

        let event = match previous {
            Some(_) => WatchEvent::Modified(resource.clone()),
            None => WatchEvent::Added(resource.clone()),
        };
        // Sent under the lock so watchers see revisions in order.
        let _ = self.events.send(event);
        resource
    }

    /// Remove an object. Returns the deleted object stamped with the
    /// deletion revision.
    pub fn delete(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Option<Resource> {
        let mut state = self.lock();
        let key = object_key(namespace, name);
        let mut removed = state.objects.get_mut(&kind)?.remove(&key)?;
        state.revision += 1;
        removed.version = state.revision;
        let _ = self.events.send(WatchEvent::Deleted(removed.clone()));
        Some(removed)
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    ///
    /// While unavailable, list and watch fail and open watches end at their
    /// next event.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of list calls served so far.
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::Unavailable("memory store is offline".into()))
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceSource for MemorySource {
    async fn list(&self, kind: ResourceKind) -> Result<Snapshot, SourceError> {
        self.check_available()?;
        self.lists.fetch_add(1, Ordering::SeqCst);

        let state = self.lock();
        let items = state
            .objects
            .get(&kind)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default();
        Ok(Snapshot {
            version: state.revision,
            items,
        })
    }

    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, SourceError> {
        self.check_available()?;

        let rx = self.events.subscribe();
        let available = Arc::clone(&self.available);
        let events = stream::unfold(Some(rx), move |rx| {
            let available = Arc::clone(&available);
            async move {
                let mut rx = rx?;
                loop {
                    let received = rx.recv().await;
                    if !available.load(Ordering::SeqCst) {
                        return Some((Err(SourceError::Unavailable("memory store went offline".into())), None));
                    }
                    match received {
                        Ok(event) if event.resource().kind == kind => return Some((Ok(event), Some(rx))),
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            return Some((Err(SourceError::Watch(format!("watcher lagged by {} events", missed))), None));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_reflects_writes() {
        let source = MemorySource::new();
        source.upsert(ResourceKind::Namespace, None, "default", json!({}));
        source.upsert(ResourceKind::Namespace, None, "kube-system", json!({}));
        source.upsert(ResourceKind::Pod, Some("default"), "web", json!({}));

        let snapshot = source.list(ResourceKind::Namespace).await.unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.version, 3);
        assert_eq!(source.list_count(), 1);
    }

    #[tokio::test]
    async fn watch_delivers_changes_for_its_kind() {
        let source = MemorySource::new();
        let mut watch = source.watch(ResourceKind::Secret).await.unwrap();

        source.upsert(ResourceKind::ConfigMap, Some("ns"), "cm", json!({}));
        source.upsert(ResourceKind::Secret, Some("ns"), "s", json!({}));
        source.upsert(ResourceKind::Secret, Some("ns"), "s", json!({"v": 2}));
        source.delete(ResourceKind::Secret, Some("ns"), "s");

        let first = watch.next().await.unwrap().unwrap();
        assert!(matches!(first, WatchEvent::Added(ref r) if r.version == 2));
        let second = watch.next().await.unwrap().unwrap();
        assert!(matches!(second, WatchEvent::Modified(ref r) if r.version == 3));
        let third = watch.next().await.unwrap().unwrap();
        assert!(matches!(third, WatchEvent::Deleted(ref r) if r.version == 4));
    }

    #[tokio::test]
    async fn unavailable_store_fails() {
        let source = MemorySource::new();
        source.set_available(false);
        assert!(source.list(ResourceKind::Pod).await.is_err());
        assert!(source.watch(ResourceKind::Pod).await.is_err());

        source.set_available(true);
        assert!(source.list(ResourceKind::Pod).await.is_ok());
    }
}
