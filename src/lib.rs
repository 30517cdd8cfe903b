//! REST control-plane server gated on cache synchronization.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod source;

pub use cache::{Caches, ResourceCacheSynchronizer, ResourceKind, SyncBarrier, SyncError};
pub use config::schema::Config;
pub use error::ServerError;
pub use lifecycle::ShutdownSignal;
