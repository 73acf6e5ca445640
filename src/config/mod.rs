//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to the server and resolver at startup
//!
//! Static versions table (resolver.kind = "static", watch = true):
//!     watcher.rs detects change
//!     → table reloaded and parsed
//!     → atomic swap inside the resolver
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{check_config, load_config, parse_config, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, ResolverConfig, ResolverKind,
    TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
