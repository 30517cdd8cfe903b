//! Backing store access.
//!
//! # Data Flow
//! ```text
//! ResourceSource::watch(kind) → stream of WatchEvent (opened first, buffers)
//! ResourceSource::list(kind)  → Snapshot { version, items }
//!
//! Implementations:
//!     kube.rs   → HTTP list/watch against a Kubernetes-style API
//!     memory.rs → in-process collections (offline mode, tests)
//! ```
//!
//! # Design Decisions
//! - Every error is transient from the synchronizer's point of view
//! - Versions are store-wide and monotonic so buffered events can be
//!   compared against the snapshot they were observed relative to

pub mod kube;
pub mod memory;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::cache::{ResourceKind, Snapshot, WatchEvent};

pub use kube::KubeSource;
pub use memory::MemorySource;

/// Stream of incremental changes for one kind.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, SourceError>>;

/// Error talking to the backing store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("watch stream error: {0}")]
    Watch(String),
}

/// The authoritative store a synchronizer mirrors.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Enumerate the whole collection.
    async fn list(&self, kind: ResourceKind) -> Result<Snapshot, SourceError>;

    /// Open a stream of changes starting now.
    ///
    /// Events that happen while the caller is still listing must be held by
    /// the stream until read.
    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, SourceError>;
}
