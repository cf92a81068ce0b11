//! # Skein
//!
//! The core of a process-attaching instrumentation agent.
//!
//! ## Overview
//!
//! Skein discovers independently authored plugins from archives mounted next
//! to the agent, applies their enhancements to code units as the host loads
//! them, and runs the agent's own background services in a deterministic
//! order.
//!
//! ## Architecture
//!
//! ```text
//!              attach                                   host load event
//!                │                                             │
//!   ┌────────────▼───────────┐   definitions   ┌───────────────▼──────────┐
//!   │ PluginBootstrap        │────────────────▶│ Transformer              │──▶ Rewriter (host)
//!   │  over IsolatedNamespace│                 │  fold plugins in order   │
//!   └────────────────────────┘                 └───────────────┬──────────┘
//!                                                              │ load(id, ctx)
//!   ┌────────────────────────┐                 ┌───────────────▼──────────┐
//!   │ ServiceManager         │                 │ InterceptorCache         │
//!   │  boot / shutdown       │                 │  one bridge per context  │
//!   └────────────────────────┘                 └──────────────────────────┘
//! ```
//!
//! - **Loader**: isolated namespaces over `*.tar[.gz]` plugin archives
//! - **Framework**: discovery, interceptor caching, transformation, service lifecycle
//! - **Runtime**: the [`SkeinAgent`](runtime::SkeinAgent) context object, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skein::prelude::*;
//!
//! #[plugin_define("com.acme.plugin.ClientDefine")]
//! fn client_define(_: &ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError> {
//!     Ok(Arc::new(ClientDefine))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let agent = SkeinAgent::builder(Arc::new(HostRewriter)).home("/opt/skein").build()?;
//!     agent.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros` *(default)*: `#[plugin_define]`, `#[interceptor]` and `#[boot_service]`
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use skein_core as core;
pub use skein_framework as framework;
pub use skein_loader as loader;
pub use skein_runtime as runtime;

#[cfg(feature = "macros")]
pub use skein_macros::{boot_service, interceptor, plugin_define};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use skein::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Agent entry point
    pub use skein_runtime::{AgentError, SkeinAgent, SkeinConfig};

    // Plugin authoring
    pub use skein_core::prelude::*;
    pub use skein_core::{SharedInterceptor, SharedService, SharedSource, WeaveMode};

    // Host integration
    pub use skein_framework::{Rewriter, TransformOutcome};

    #[cfg(feature = "macros")]
    pub use skein_macros::{boot_service, interceptor, plugin_define};
}
