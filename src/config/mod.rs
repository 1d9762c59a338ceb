//! Configuration management subsystem for the manager itself.
//!
//! # Data Flow
//! ```text
//! manager.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (DOCKER_CORE_CONFIG, BACKUP_PATH, PORT, ...)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → shared via Arc with the HTTP layer and services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults matching a stock Container Manager install
//! - Validation separates syntactic (serde) from semantic checks
//! - The daemon's own `dockerd.json` is not configuration of this tool; it
//!   is handled by the `daemon` module

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ManagerConfig;
pub use schema::{
    ListenerConfig, ObservabilityConfig, PathsConfig, RetentionConfig, SecurityConfig,
    ServiceConfig, TimeoutConfig,
};
