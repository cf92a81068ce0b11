//! Factory registry: construct plugin-contributed objects by name.
//!
//! # Overview
//!
//! Every constructible object (plugin definition, interceptor, boot service)
//! is a plain function pointer keyed by an identity string.  Registrations
//! arrive two ways:
//!
//! - link-time, through the `linkme` slices below (usually via the
//!   `skein-macros` attributes);
//! - manually, through the `register_*` / `with_*` builders.
//!
//! [`FactoryRegistry::linked`] snapshots the slices into a table that the
//! loader and the service manager consult at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::warn;

use crate::define::PluginDefine;
use crate::error::{BoxError, ConstructError, ConstructResult};
use crate::interceptor::Interceptor;
use crate::service::{BootService, RegistrationKind, ServiceId};
use crate::source::CodeSource;
use crate::unit::CodeUnit;

// =============================================================================
// Construct Context
// =============================================================================

/// What a factory sees when it is asked for a fresh instance.
#[derive(Clone, Copy)]
pub struct ConstructContext<'a> {
    /// Identity being constructed.
    pub identity: &'a str,
    /// Defining code unit, when construction went through a namespace.
    pub unit: Option<&'a CodeUnit>,
    /// Namespace the instance is constructed for.
    pub source: Option<&'a dyn CodeSource>,
}

impl<'a> ConstructContext<'a> {
    /// A context with no defining unit or namespace.
    pub fn detached(identity: &'a str) -> Self {
        Self {
            identity,
            unit: None,
            source: None,
        }
    }
}

impl fmt::Debug for ConstructContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructContext")
            .field("identity", &self.identity)
            .field("unit", &self.unit.map(|u| u.name()))
            .field("source", &self.source.map(|s| s.context_id()))
            .finish()
    }
}

// =============================================================================
// Factory Function Types
// =============================================================================

/// Builds a plugin definition's behaviour.
pub type DefineFactory = fn(&ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError>;

/// Builds an interceptor instance.
pub type InterceptorFactory = fn(&ConstructContext<'_>) -> Result<Arc<dyn Interceptor>, BoxError>;

/// Builds a boot service.
pub type ServiceFactory = fn(&ConstructContext<'_>) -> Result<Arc<dyn BootService>, BoxError>;

/// A plugin definition factory keyed by its defining-unit identity.
#[derive(Clone, Copy)]
pub struct DefineRegistration {
    pub identity: &'static str,
    pub factory: DefineFactory,
}

/// An interceptor factory keyed by interceptor identity.
#[derive(Clone, Copy)]
pub struct InterceptorRegistration {
    pub identity: &'static str,
    pub factory: InterceptorFactory,
}

/// A boot service factory with its registration kind.
#[derive(Clone)]
pub struct ServiceRegistration {
    pub identity: ServiceId,
    pub kind: RegistrationKind,
    pub factory: ServiceFactory,
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Link-time Registries (linkme distributed slices)
// =============================================================================

/// Plugin definition factories contributed at link time.
#[distributed_slice]
pub static PLUGIN_DEFINES: [DefineRegistration];

/// Interceptor factories contributed at link time.
#[distributed_slice]
pub static INTERCEPTORS: [InterceptorRegistration];

/// Boot service factories contributed at link time.
#[distributed_slice]
pub static BOOT_SERVICES: [ServiceRegistration];

// =============================================================================
// FactoryRegistry
// =============================================================================

/// Name-indexed factory table.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    defines: HashMap<String, DefineFactory>,
    interceptors: HashMap<String, InterceptorFactory>,
    services: Vec<ServiceRegistration>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every link-time registration.
    ///
    /// Duplicate define/interceptor identities are logged; the last one wins.
    pub fn linked() -> Self {
        let mut registry = Self::new();
        for entry in PLUGIN_DEFINES.iter() {
            registry.register_define(entry.identity, entry.factory);
        }
        for entry in INTERCEPTORS.iter() {
            registry.register_interceptor(entry.identity, entry.factory);
        }
        for entry in BOOT_SERVICES.iter() {
            registry.services.push(entry.clone());
        }
        registry
    }

    pub fn with_define(mut self, identity: impl Into<String>, factory: DefineFactory) -> Self {
        self.register_define(identity, factory);
        self
    }

    pub fn with_interceptor(
        mut self,
        identity: impl Into<String>,
        factory: InterceptorFactory,
    ) -> Self {
        self.register_interceptor(identity, factory);
        self
    }

    pub fn with_service(
        mut self,
        identity: impl Into<ServiceId>,
        kind: RegistrationKind,
        factory: ServiceFactory,
    ) -> Self {
        self.register_service(identity, kind, factory);
        self
    }

    pub fn register_define(&mut self, identity: impl Into<String>, factory: DefineFactory) {
        let identity = identity.into();
        if self.defines.insert(identity.clone(), factory).is_some() {
            warn!(identity = %identity, "Duplicate plugin define factory, replacing");
        }
    }

    pub fn register_interceptor(&mut self, identity: impl Into<String>, factory: InterceptorFactory) {
        let identity = identity.into();
        if self.interceptors.insert(identity.clone(), factory).is_some() {
            warn!(identity = %identity, "Duplicate interceptor factory, replacing");
        }
    }

    /// Appends a service registration; conflicts are decided by the service
    /// manager, not here.
    pub fn register_service(
        &mut self,
        identity: impl Into<ServiceId>,
        kind: RegistrationKind,
        factory: ServiceFactory,
    ) {
        self.services.push(ServiceRegistration {
            identity: identity.into(),
            kind,
            factory,
        });
    }

    pub fn has_define(&self, identity: &str) -> bool {
        self.defines.contains_key(identity)
    }

    pub fn has_interceptor(&self, identity: &str) -> bool {
        self.interceptors.contains_key(identity)
    }

    /// Constructs the plugin definition registered under `ctx.identity`.
    pub fn construct_define(&self, ctx: &ConstructContext<'_>) -> ConstructResult<Arc<dyn PluginDefine>> {
        let factory = self
            .defines
            .get(ctx.identity)
            .ok_or_else(|| ConstructError::NoFactory(ctx.identity.to_string()))?;
        factory(ctx).map_err(|e| ConstructError::factory(ctx.identity, e))
    }

    /// Constructs the interceptor registered under `ctx.identity`.
    pub fn construct_interceptor(
        &self,
        ctx: &ConstructContext<'_>,
    ) -> ConstructResult<Arc<dyn Interceptor>> {
        let factory = self
            .interceptors
            .get(ctx.identity)
            .ok_or_else(|| ConstructError::NoFactory(ctx.identity.to_string()))?;
        factory(ctx).map_err(|e| ConstructError::factory(ctx.identity, e))
    }

    /// Service registrations in registration order.
    pub fn services(&self) -> &[ServiceRegistration] {
        &self.services
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut defines: Vec<_> = self.defines.keys().collect();
        defines.sort();
        let mut interceptors: Vec<_> = self.interceptors.keys().collect();
        interceptors.sort();
        f.debug_struct("FactoryRegistry")
            .field("defines", &defines)
            .field("interceptors", &interceptors)
            .field("services", &self.services)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::define::UnitMatch;

    struct Probe;

    impl Interceptor for Probe {
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    struct Everything;

    impl PluginDefine for Everything {
        fn selector(&self) -> UnitMatch {
            UnitMatch::predicate(|_| true)
        }
    }

    fn probe(_: &ConstructContext<'_>) -> Result<Arc<dyn Interceptor>, BoxError> {
        Ok(Arc::new(Probe))
    }

    fn broken(_: &ConstructContext<'_>) -> Result<Arc<dyn Interceptor>, BoxError> {
        Err("boom".into())
    }

    fn everything(_: &ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError> {
        Ok(Arc::new(Everything))
    }

    #[test]
    fn test_construct_by_identity() {
        let registry = FactoryRegistry::new()
            .with_interceptor("probe", probe)
            .with_define("plugins.Everything", everything);

        let interceptor = registry
            .construct_interceptor(&ConstructContext::detached("probe"))
            .unwrap();
        assert!(interceptor.as_any().downcast::<Probe>().is_ok());

        let define = registry
            .construct_define(&ConstructContext::detached("plugins.Everything"))
            .unwrap();
        assert!(define.selector().matches(&"any.Unit".into()));
    }

    #[test]
    fn test_missing_and_failing_factories() {
        let registry = FactoryRegistry::new().with_interceptor("broken", broken);

        let err = registry
            .construct_interceptor(&ConstructContext::detached("absent"))
            .err()
            .unwrap();
        assert!(matches!(err, ConstructError::NoFactory(id) if id == "absent"));

        let err = registry
            .construct_interceptor(&ConstructContext::detached("broken"))
            .err()
            .unwrap();
        assert!(matches!(err, ConstructError::Factory { ref identity, .. } if identity == "broken"));
    }

    #[test]
    fn test_services_keep_registration_order() {
        fn none(_: &ConstructContext<'_>) -> Result<Arc<dyn BootService>, BoxError> {
            Err("unused".into())
        }

        let registry = FactoryRegistry::new()
            .with_service("a", RegistrationKind::Default, none)
            .with_service("b", RegistrationKind::Override("a".into()), none)
            .with_service("c", RegistrationKind::Plain, none);
        let ids: Vec<_> = registry.services().iter().map(|s| s.identity.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
