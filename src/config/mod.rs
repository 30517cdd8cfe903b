//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (command-line flags override file values)
//!     → validation.rs (semantic checks, listener decision table)
//!     → Config (validated, immutable)
//!     → passed by value/reference to every subsystem
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never mutated
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::{Config, LogFormat, ObservabilityConfig, ServerConfig, SourceConfig, SourceMode, SyncConfig};
pub use validation::ValidationError;
