//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → listener.rs (decision table → ListenerPlan)
//!     → tls.rs (PEM certificate and key, when TLS is enabled)
//!     → bind all sockets
//!     → serve the shared container on every listener
//! ```
//!
//! # Design Decisions
//! - Every socket is bound before any listener serves
//! - One cancellation token stops all listeners
//! - A failing listener takes the other one down with it

pub mod listener;
pub mod tls;

pub use listener::{serve, ListenerPlan, ServeError, TlsListener};
pub use tls::{load_tls_config, TlsError};
