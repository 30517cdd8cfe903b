//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the shared token (first signal only)
//!
//! Startup (startup.rs):
//!     Check listeners → Build backing store → Sync caches → Serve
//!
//! Shutdown:
//!     Token cancelled → Listeners drain → Synchronizers stop → Exit
//! ```
//!
//! # Design Decisions
//! - One token, created by the signal coordinator, reaches every task
//! - Ordered startup: listeners are checked first and bound last
//! - Ordered shutdown: listeners first, caches after

pub mod signals;
pub mod startup;

pub use signals::{ShutdownSignal, SignalError};
pub use startup::{build_source, run, run_with_source};
