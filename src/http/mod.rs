//! HTTP request handling.
//!
//! # Data Flow
//! ```text
//! listener (plaintext / TLS)
//!     → middleware/logging.rs (method, path, status, latency)
//!     → TimeoutLayer
//!     → routes.rs (probes, cache lookups)
//!     → Caches (read-only)
//! ```

pub mod middleware;
pub mod routes;
pub mod server;

pub use server::build_container;
