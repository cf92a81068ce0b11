//! Procedural macros for the Skein agent.
//!
//! Each attribute leaves the decorated factory function untouched and
//! registers it into one of the link-time registries of `skein-core`, so that
//! `FactoryRegistry::linked()` finds it without any manual wiring.
//!
//! ```rust,ignore
//! use skein::prelude::*;
//!
//! #[plugin_define("com.acme.plugin.ClientDefine")]
//! fn client_define(_: &ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError> {
//!     Ok(Arc::new(ClientDefine))
//! }
//!
//! #[interceptor("com.acme.plugin.ClientInterceptor")]
//! fn client_interceptor(_: &ConstructContext<'_>) -> Result<Arc<dyn Interceptor>, BoxError> {
//!     Ok(Arc::new(ClientInterceptor::default()))
//! }
//!
//! #[boot_service(id = "sampler", overrides = "default-sampler")]
//! fn sampler(_: &ConstructContext<'_>) -> Result<Arc<dyn BootService>, BoxError> {
//!     Ok(Arc::new(RateSampler::new()))
//! }
//! ```
//!
//! Generated code refers to `::skein_core`, so the calling crate must depend
//! on `skein-core` directly.

mod register;

use proc_macro::TokenStream;

use register::Registry;

/// Registers a plugin definition factory under a unit identity.
///
/// The identity is the dotted unit name listed in `skein-plugin.def`; the
/// unit must also be present in a plugin archive.
#[proc_macro_attribute]
pub fn plugin_define(attr: TokenStream, item: TokenStream) -> TokenStream {
    register::register_factory(Registry::Define, attr, item)
}

/// Registers an interceptor factory under a unit identity.
#[proc_macro_attribute]
pub fn interceptor(attr: TokenStream, item: TokenStream) -> TokenStream {
    register::register_factory(Registry::Interceptor, attr, item)
}

/// Registers a boot service factory.
///
/// - `id = "…"` *(required)*: the service identity
/// - `default`: the fallback implementation for `id`
/// - `overrides = "…"`: replaces the default registered under that identity
#[proc_macro_attribute]
pub fn boot_service(attr: TokenStream, item: TokenStream) -> TokenStream {
    register::boot_service(attr, item)
}
