//! Request container middleware.

pub mod logging;

pub use logging::{attach_logging, request_logging};
