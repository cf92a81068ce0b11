//! # Skein Core
//!
//! Shared vocabulary of the Skein instrumentation agent.
//!
//! This crate holds the types every other layer speaks in:
//!
//! - **Code units**: identities, images and origins ([`UnitName`], [`UnitImage`], [`CodeUnit`])
//! - **Code sources**: anything that resolves a unit by name ([`CodeSource`], [`MemorySource`])
//! - **Plugin definitions**: selectors, enhancements and the apply fold ([`PluginDefine`])
//! - **Interceptors**: plugin objects woven into enhanced code ([`Interceptor`])
//! - **Boot services**: lifecycle components and their registration kinds ([`BootService`])
//! - **Factory registry**: construct-by-name tables fed by `linkme` ([`FactoryRegistry`])
//!
//! ```text
//! ┌───────────────┐  resolve   ┌────────────┐  construct  ┌─────────────────┐
//! │  CodeSource   │───────────▶│  CodeUnit  │────────────▶│ FactoryRegistry │
//! │ (namespaces)  │            └────────────┘             └─────────────────┘
//! └───────────────┘                                        │      │      │
//!                                                 PluginDefine  Interceptor  BootService
//! ```

pub mod define;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod service;
pub mod source;
pub mod unit;

pub use define::{
    EnhanceContext, EnhanceSite, EnhancementDescriptor, EnhancementKind, MemberMatch,
    PluginDefine, SharedDefine, UnitMatch, WeaveMode, Weaver,
};
pub use error::{BoxError, ConstructError, ConstructResult, ResolveError, ResolveResult};
pub use interceptor::{CallSite, Interceptor, SharedInterceptor};
pub use registry::{
    BOOT_SERVICES, ConstructContext, DefineFactory, DefineRegistration, FactoryRegistry,
    INTERCEPTORS, InterceptorFactory, InterceptorRegistration, PLUGIN_DEFINES, ServiceFactory,
    ServiceRegistration,
};
pub use service::{BootService, RegistrationKind, ServiceId, SharedService};
pub use source::{CodeSource, MemorySource, SharedSource};
pub use unit::{CodeUnit, ContextId, ResourceLocation, UNIT_EXTENSION, UnitImage, UnitName, UnitOrigin};

// Used by code generated from `skein-macros`.
pub use linkme;

/// Prelude for common imports.
pub mod prelude {
    pub use super::define::{
        EnhanceSite, EnhancementDescriptor, EnhancementKind, MemberMatch, PluginDefine, UnitMatch,
    };
    pub use super::error::BoxError;
    pub use super::interceptor::{CallSite, Interceptor};
    pub use super::registry::ConstructContext;
    pub use super::service::{BootService, RegistrationKind, ServiceId};
    pub use super::unit::{UnitImage, UnitName};
}
