//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Replay loop talks to backing store
//!     → failure: backoff.rs gives the next delay (exponential, jittered, capped)
//!     → success: schedule resets
//! ```
//!
//! # Design Decisions
//! - Transient backing-store failures never escape the synchronizer
//! - Jittered backoff keeps many synchronizers from retrying in lockstep

pub mod backoff;
