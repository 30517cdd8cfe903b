//! Local mirror of one resource collection.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{Resource, WatchEvent};

/// A thread-safe keyed mirror of a collection.
///
/// Only the owning replay task writes; any number of request handlers read
/// concurrently through `get`/`list`.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<DashMap<String, Resource>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile the mirror with a full listing.
    ///
    /// Keys missing from `items` are removed and every listed object is
    /// written. Readers never observe an empty map during a relist.
    pub fn replace(&self, items: Vec<Resource>) {
        let keep: HashSet<String> = items.iter().map(Resource::key).collect();
        self.inner.retain(|key, _| keep.contains(key));
        for item in items {
            self.inner.insert(item.key(), item);
        }
    }

    /// Apply one incremental change.
    pub fn apply(&self, event: WatchEvent) {
        match event {
            WatchEvent::Added(r) | WatchEvent::Modified(r) => {
                self.inner.insert(r.key(), r);
            }
            WatchEvent::Deleted(r) => {
                self.inner.remove(&r.key());
            }
        }
    }

    /// Look up an object by key.
    pub fn get(&self, key: &str) -> Option<Resource> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// All objects, ordered by key.
    pub fn list(&self) -> Vec<Resource> {
        let mut items: Vec<Resource> = self.inner.iter().map(|r| r.value().clone()).collect();
        items.sort_by_key(Resource::key);
        items
    }

    /// Objects in one namespace, ordered by name.
    pub fn list_namespace(&self, namespace: &str) -> Vec<Resource> {
        let mut items: Vec<Resource> = self
            .inner
            .iter()
            .filter(|r| r.value().namespace.as_deref() == Some(namespace))
            .map(|r| r.value().clone())
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceKind;
    use serde_json::json;

    fn pod(ns: &str, name: &str, version: u64) -> Resource {
        Resource {
            kind: ResourceKind::Pod,
            namespace: Some(ns.to_string()),
            name: name.to_string(),
            version,
            object: json!({}),
        }
    }

    #[test]
    fn replace_drops_vanished_keys() {
        let store = Store::new();
        store.replace(vec![pod("a", "one", 1), pod("a", "two", 2)]);
        assert_eq!(store.len(), 2);

        store.replace(vec![pod("a", "two", 3), pod("b", "three", 3)]);
        assert!(store.get("a/one").is_none());
        assert_eq!(store.get("a/two").unwrap().version, 3);
        assert!(store.get("b/three").is_some());
    }

    #[test]
    fn apply_events() {
        let store = Store::new();
        store.apply(WatchEvent::Added(pod("ns", "p", 1)));
        store.apply(WatchEvent::Modified(pod("ns", "p", 2)));
        assert_eq!(store.get("ns/p").unwrap().version, 2);

        store.apply(WatchEvent::Deleted(pod("ns", "p", 3)));
        assert!(store.get("ns/p").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn list_by_namespace() {
        let store = Store::new();
        store.replace(vec![pod("a", "z", 1), pod("b", "y", 1), pod("a", "x", 1)]);

        let names: Vec<_> = store.list_namespace("a").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["x", "z"]);

        let keys: Vec<_> = store.list().iter().map(Resource::key).collect();
        assert_eq!(keys, vec!["a/x", "a/z", "b/y"]);
    }
}
