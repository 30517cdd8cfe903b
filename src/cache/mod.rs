//! Resource cache subsystem.
//!
//! # Data Flow
//! ```text
//! ResourceSource (list + watch, one per backing store)
//!     → synchronizer.rs (replay loop per kind)
//!         open watch → list snapshot → apply → drain buffered events → synced
//!     → store.rs (local mirror, single writer / many readers)
//!
//! Startup gate:
//!     barrier.rs starts every synchronizer
//!     → polls is_synchronized() on all of them
//!     → Ready(Caches) | Cancelled
//! ```
//!
//! # Design Decisions
//! - Synchronized flag is latched: false → true once, never back
//! - Unreachable backing stores are retried forever with backoff
//! - The barrier is all-or-nothing; no kind is served before every kind is synced

pub mod barrier;
pub mod kind;
pub mod store;
pub mod synchronizer;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use barrier::{Caches, Ready, SyncBarrier, SyncError};
pub use kind::ResourceKind;
pub use store::Store;
pub use synchronizer::ResourceCacheSynchronizer;

/// One object mirrored from the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
    /// Store-wide revision at which this object was last written.
    pub version: u64,
    /// Full object as served by the backing store.
    pub object: Value,
}

impl Resource {
    /// Build a resource from a raw object, reading identity from `metadata`.
    ///
    /// Returns `None` when the object has no `metadata.name`. A missing or
    /// non-numeric `resourceVersion` is treated as revision 0.
    pub fn from_object(kind: ResourceKind, object: Value) -> Option<Self> {
        let metadata = object.get("metadata")?;
        let name = metadata.get("name")?.as_str()?.to_string();
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        let version = metadata
            .get("resourceVersion")
            .and_then(Value::as_str)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Some(Self {
            kind,
            namespace,
            name,
            version,
            object,
        })
    }

    /// Cache key: `namespace/name` for namespaced objects, `name` otherwise.
    pub fn key(&self) -> String {
        object_key(self.namespace.as_deref(), &self.name)
    }
}

/// Build a cache key from its parts.
pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
        _ => name.to_string(),
    }
}

/// Result of a full enumeration of one collection.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Revision of the collection at the time of listing.
    pub version: u64,
    pub items: Vec<Resource>,
}

/// Incremental change to a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(Resource),
    Modified(Resource),
    Deleted(Resource),
}

impl WatchEvent {
    pub fn resource(&self) -> &Resource {
        match self {
            WatchEvent::Added(r) | WatchEvent::Modified(r) | WatchEvent::Deleted(r) => r,
        }
    }

    pub fn version(&self) -> u64 {
        self.resource().version
    }
}
