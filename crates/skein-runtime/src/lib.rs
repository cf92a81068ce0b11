//! Skein Runtime - attaching and running the Skein agent.
//!
//! This crate provides:
//! - The agent context object ([`SkeinAgent`]) wiring the loader and framework together
//! - Layered configuration (`skein.toml`, `SKEIN_*` variables) ([`config`])
//! - Plugin configuration sections served to marked units ([`PluginConfigStore`])
//! - Logging configuration ([`logging`])
//!
//! # Deployment layout
//!
//! ```text
//! <home>/
//! ├── skein.toml
//! ├── plugins/        *.tar, *.tar.gz archives, always searched first
//! └── activations/    optional toolkit archives
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skein_runtime::SkeinAgent;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let agent = SkeinAgent::builder(Arc::new(HostRewriter)).home("/opt/skein").build()?;
//!     install_load_hook(&agent);
//!
//!     // Boot services, run until Ctrl+C, shut down
//!     agent.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod plugin_config;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, SkeinConfig};
pub use error::{AgentError, AgentResult};
pub use logging::LoggingBuilder;
pub use plugin_config::PluginConfigStore;
pub use runtime::{AgentBuilder, DEFAULT_NAMESPACE, SkeinAgent};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient logging imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
