//! Plugin discovery for the Skein agent.
//!
//! # Architecture
//!
//! A plugin reaches the agent as a [`PluginDefinition`]: a name, the identity
//! it was constructed from, and a [`PluginDefine`](skein_core::PluginDefine)
//! carrying its selector and enhancements.  Definitions come from two
//! sources, both read through the default namespace:
//!
//! - **Manifests** (`skein-plugin.def`), one `name=identity` per line.  Each
//!   identity is resolved in the namespace and constructed through the
//!   factory registry.
//! - **Declarations** (`skein-plugin.json`), data-only plugins turned into
//!   [`DeclaredDefine`]s.
//!
//! [`PluginBootstrap`] produces the list; [`PluginFinder`] indexes it for the
//! transformation pipeline.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let plugins = PluginBootstrap::new(namespace).exclude(["jdbc"]).load();
//! let finder = PluginFinder::new(plugins);
//! for definition in finder.find(&UnitName::new("com.acme.Client")) {
//!     println!("{} applies", definition.name());
//! }
//! ```

// ─── Submodules ──────────────────────────────────────────────────────────────
pub mod bootstrap;
pub mod definition;
pub mod finder;
pub mod manifest;
pub mod structured;

// ─── Re-exports from submodules ──────────────────────────────────────────────
pub use bootstrap::PluginBootstrap;
pub use definition::PluginDefinition;
pub use finder::PluginFinder;
pub use manifest::{DEFAULT_MANIFEST, ManifestEntry, ManifestLineError, parse_manifest};
pub use structured::{DEFAULT_DECLARATIONS, Declaration, DeclaredDefine, DeclaredTarget};
