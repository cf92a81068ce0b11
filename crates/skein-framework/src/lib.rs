//! # Skein Framework
//!
//! The agent's moving parts, built on the core types and the loader:
//!
//! - **Plugin discovery**: manifests and declarations into [`PluginDefinition`]s ([`plugin`])
//! - **Interceptor cache**: one interceptor per (identity, target context) ([`InterceptorCache`])
//! - **Transformation pipeline**: ordered, failure-isolated enhancement of units ([`Transformer`])
//! - **Lifecycle orchestrator**: boot service resolution and phases ([`ServiceManager`])
//!
//! ```text
//! ┌─────────────────┐   definitions   ┌─────────────┐  load(id, ctx)  ┌──────────────────┐
//! │ PluginBootstrap │────────────────▶│ Transformer │────────────────▶│ InterceptorCache │
//! └─────────────────┘                 └─────────────┘                 └──────────────────┘
//!          │                                 │                                 │
//!          └──────── IsolatedNamespace ◀─────┴──────── bridging namespaces ◀───┘
//! ```

pub mod error;
pub mod interceptor_cache;
pub mod manager;
pub mod pipeline;
pub mod plugin;

pub use error::{
    LifecycleError, LifecycleResult, LoadError, LoadResult, TransformError, TransformResult,
};
pub use interceptor_cache::InterceptorCache;
pub use manager::{
    RegistryDiscovery, ServiceDescriptor, ServiceDiscovery, ServiceManager, StaticDiscovery,
};
pub use pipeline::{AGENT_UNIT_PREFIX, IgnoreRules, Rewriter, TransformOutcome, Transformer};
pub use plugin::{
    DeclaredDefine, PluginBootstrap, PluginDefinition, PluginFinder, DEFAULT_DECLARATIONS,
    DEFAULT_MANIFEST,
};
