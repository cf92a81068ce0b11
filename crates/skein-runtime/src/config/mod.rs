//! Configuration for the Skein agent.
//!
//! Layered loading (defaults, `skein.toml`, `SKEIN_*` variables) through
//! figment, plus validation of the loaded values.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AgentConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PluginConfig,
    SkeinConfig, SpanEventConfig,
};
pub use validation::validate_config;
