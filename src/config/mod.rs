//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overlay: PORT, HOST, APP_ENV, DATABASE_URL, ... (loader.rs)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with no config at all
//! - An unusable PORT falls back to the default instead of failing startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, EnvWarning, LoadedConfig};
pub use schema::{DatabaseSettings, LogFormat, ObservabilityConfig, ServerConfig, ServerSettings};
