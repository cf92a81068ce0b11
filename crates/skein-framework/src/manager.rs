//! Boot service resolution and lifecycle.
//!
//! [`ServiceManager`] owns every internal background service of the agent. It:
//!
//! - Collects [`ServiceDescriptor`]s from a [`ServiceDiscovery`] collaborator.
//! - Resolves them in a single pass into exactly one active service per
//!   identity, honouring [`RegistrationKind`] (see the table in
//!   [`skein_core::service`]).
//! - Drives `prepare` → `start` → `on_complete` over the resolved set in
//!   priority order, and `shutdown` in reverse.
//! - Isolates every hook: an error or panic is logged and the phase moves on
//!   to the next service.
//!
//! # Example
//!
//! ```rust,ignore
//! use skein_framework::manager::{RegistryDiscovery, ServiceManager};
//!
//! let manager = ServiceManager::new(RegistryDiscovery::new(registry));
//! manager.boot().await?;
//! // …later…
//! manager.shutdown().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use parking_lot::RwLock;
use skein_core::{
    BootService, BoxError, ConstructContext, FactoryRegistry, RegistrationKind, ServiceId,
    SharedService,
};
use tracing::{Instrument, debug, error, info, span, warn};

use crate::error::{LifecycleError, LifecycleResult, panic_message};

// =============================================================================
// ServiceDescriptor
// =============================================================================

/// A discovered service implementation and how it registers.
#[derive(Clone)]
pub struct ServiceDescriptor {
    id: ServiceId,
    kind: RegistrationKind,
    service: SharedService,
}

impl ServiceDescriptor {
    pub fn new(id: impl Into<ServiceId>, kind: RegistrationKind, service: SharedService) -> Self {
        Self {
            id: id.into(),
            kind,
            service,
        }
    }

    /// A plain registration of `service` under `id`.
    pub fn plain(id: impl Into<ServiceId>, service: SharedService) -> Self {
        Self::new(id, RegistrationKind::Plain, service)
    }

    /// A default implementation for `id`.
    pub fn default_for(id: impl Into<ServiceId>, service: SharedService) -> Self {
        Self::new(id, RegistrationKind::Default, service)
    }

    /// An implementation `id` that overrides the default of `target`.
    pub fn overriding(
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
        service: SharedService,
    ) -> Self {
        Self::new(id, RegistrationKind::Override(target.into()), service)
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn kind(&self) -> &RegistrationKind {
        &self.kind
    }

    pub fn service(&self) -> &SharedService {
        &self.service
    }

    pub fn priority(&self) -> i32 {
        self.service.priority()
    }

    /// Identity of the slot this descriptor competes for.
    pub fn slot_id(&self) -> &ServiceId {
        match &self.kind {
            RegistrationKind::Override(target) => target,
            RegistrationKind::Plain | RegistrationKind::Default => &self.id,
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority())
            .finish()
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Supplies the service implementations to resolve, in discovery order.
pub trait ServiceDiscovery: Send + Sync {
    fn discover(&self) -> Vec<ServiceDescriptor>;
}

/// Discovery over an explicit list.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    descriptors: Vec<ServiceDescriptor>,
}

impl StaticDiscovery {
    pub fn new(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().collect(),
        }
    }

    pub fn with(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

impl ServiceDiscovery for StaticDiscovery {
    fn discover(&self) -> Vec<ServiceDescriptor> {
        self.descriptors.clone()
    }
}

/// Discovery over the service registrations of a [`FactoryRegistry`].
///
/// Each registration is constructed in registration order; a failing
/// constructor is logged and skipped.
#[derive(Debug, Clone)]
pub struct RegistryDiscovery {
    registry: Arc<FactoryRegistry>,
}

impl RegistryDiscovery {
    pub fn new(registry: Arc<FactoryRegistry>) -> Self {
        Self { registry }
    }
}

impl ServiceDiscovery for RegistryDiscovery {
    fn discover(&self) -> Vec<ServiceDescriptor> {
        self.registry
            .services()
            .iter()
            .filter_map(|registration| {
                let ctx = ConstructContext::detached(registration.identity.as_str());
                match (registration.factory)(&ctx) {
                    Ok(service) => Some(ServiceDescriptor::new(
                        registration.identity.clone(),
                        registration.kind.clone(),
                        service,
                    )),
                    Err(e) => {
                        error!(
                            service = %registration.identity,
                            error = %e,
                            "Failed to construct boot service, skipping"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

// =============================================================================
// Resolution
// =============================================================================

struct Slot {
    id: ServiceId,
    descriptor: ServiceDescriptor,
    /// An override still waiting for the default it replaces.
    provisional: bool,
}

/// Resolves `descriptors` into one descriptor per identity, in slot
/// insertion order.
fn resolve(descriptors: Vec<ServiceDescriptor>) -> LifecycleResult<Vec<(ServiceId, ServiceDescriptor)>> {
    let mut slots: Vec<Slot> = Vec::new();
    let mut index: HashMap<ServiceId, usize> = HashMap::new();

    for descriptor in descriptors {
        let slot_id = descriptor.slot_id().clone();
        let existing = index.get(&slot_id).copied();

        match (descriptor.kind().clone(), existing) {
            (_, None) => {
                let provisional = descriptor.kind().is_override();
                index.insert(slot_id.clone(), slots.len());
                slots.push(Slot {
                    id: slot_id,
                    descriptor,
                    provisional,
                });
            }
            (RegistrationKind::Default, Some(i)) => {
                let slot = &mut slots[i];
                if slot.provisional {
                    debug!(service = %slot_id, "Default arrived for provisional override");
                    slot.provisional = false;
                } else {
                    debug!(
                        service = %slot_id,
                        dropped = %descriptor.id(),
                        "Slot already filled, dropping default"
                    );
                }
            }
            (RegistrationKind::Plain, Some(_)) => {
                return Err(LifecycleError::conflict(
                    &slot_id,
                    format!("plain registration '{}' collides with an existing one", descriptor.id()),
                ));
            }
            (RegistrationKind::Override(_), Some(i)) => {
                let slot = &mut slots[i];
                if !slot.descriptor.kind().is_default() {
                    return Err(LifecycleError::conflict(
                        &slot_id,
                        format!(
                            "override '{}' targets a slot held by '{}' ({:?})",
                            descriptor.id(),
                            slot.descriptor.id(),
                            slot.descriptor.kind()
                        ),
                    ));
                }
                info!(
                    service = %slot_id,
                    default = %slot.descriptor.id(),
                    replacement = %descriptor.id(),
                    "Default service overridden"
                );
                slot.descriptor = descriptor;
            }
        }
    }

    if let Some(slot) = slots.iter().find(|s| s.provisional) {
        return Err(LifecycleError::conflict(
            &slot.id,
            format!("override '{}' has no default to replace", slot.descriptor.id()),
        ));
    }

    Ok(slots.into_iter().map(|s| (s.id, s.descriptor)).collect())
}

// =============================================================================
// Phases
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prepare,
    Start,
    Complete,
    Shutdown,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Start => "start",
            Self::Complete => "on_complete",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one hook, logging errors and panics instead of propagating them.
async fn run_isolated(id: &ServiceId, phase: Phase, service: &SharedService) {
    let hook = match phase {
        Phase::Prepare => service.prepare(),
        Phase::Start => service.start(),
        Phase::Complete => service.on_complete(),
        Phase::Shutdown => service.shutdown(),
    };

    let outcome: Result<Result<(), BoxError>, _> = AssertUnwindSafe(hook).catch_unwind().await;
    match outcome {
        Ok(Ok(())) => debug!(service = %id, phase = %phase, "Service hook finished"),
        Ok(Err(e)) => error!(service = %id, phase = %phase, error = %e, "Service hook failed"),
        Err(payload) => error!(
            service = %id,
            phase = %phase,
            panic = %panic_message(payload.as_ref()),
            "Service hook panicked"
        ),
    }
}

// =============================================================================
// ServiceManager
// =============================================================================

#[derive(Default)]
struct Resolved {
    /// Boot order: priority ascending, ties in slot order.
    order: Vec<(ServiceId, SharedService)>,
    by_id: HashMap<ServiceId, SharedService>,
}

/// Resolves and drives the agent's boot services.
pub struct ServiceManager {
    discovery: Box<dyn ServiceDiscovery>,
    booted: AtomicBool,
    stopped: AtomicBool,
    resolved: RwLock<Resolved>,
}

impl ServiceManager {
    pub fn new(discovery: impl ServiceDiscovery + 'static) -> Self {
        Self {
            discovery: Box::new(discovery),
            booted: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            resolved: RwLock::new(Resolved::default()),
        }
    }

    /// Resolves the discovered services and runs the three boot phases.
    ///
    /// Only a resolution conflict fails the boot; hook failures are logged.
    pub async fn boot(&self) -> LifecycleResult<()> {
        if self
            .booted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LifecycleError::AlreadyBooted);
        }

        let descriptors = self.discovery.discover();
        let discovered = descriptors.len();
        let slots = match resolve(descriptors) {
            Ok(slots) => slots,
            Err(e) => {
                error!(error = %e, "Boot service resolution failed");
                self.booted.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let mut order: Vec<(ServiceId, SharedService)> = slots
            .into_iter()
            .map(|(id, descriptor)| (id, Arc::clone(descriptor.service())))
            .collect();
        order.sort_by_key(|(_, service)| service.priority());

        let by_id = order
            .iter()
            .map(|(id, service)| (id.clone(), Arc::clone(service)))
            .collect();
        *self.resolved.write() = Resolved {
            order: order.clone(),
            by_id,
        };
        info!(discovered, active = order.len(), "Boot services resolved");

        for phase in [Phase::Prepare, Phase::Start, Phase::Complete] {
            let span = span!(tracing::Level::DEBUG, "boot", phase = %phase);
            async {
                for (id, service) in &order {
                    run_isolated(id, phase, service).await;
                }
            }
            .instrument(span)
            .await;
        }

        info!("Boot services started");
        Ok(())
    }

    /// Shuts every resolved service down in reverse boot order.
    ///
    /// No-op before boot and on repeated calls.
    pub async fn shutdown(&self) {
        if !self.booted.load(Ordering::Acquire) {
            debug!("Shutdown requested before boot, nothing to do");
            return;
        }
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let order = self.services();
        for (id, service) in order.iter().rev() {
            run_isolated(id, Phase::Shutdown, service).await;
        }
        info!(count = order.len(), "Boot services shut down");
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    /// The active service for `id`, if any.
    pub fn find_service(&self, id: &str) -> Option<SharedService> {
        self.resolved.read().by_id.get(id).map(Arc::clone)
    }

    /// The first active service whose concrete type is `T`.
    pub fn find<T: BootService>(&self) -> Option<Arc<T>> {
        self.resolved
            .read()
            .order
            .iter()
            .find_map(|(_, service)| Arc::clone(service).as_any().downcast::<T>().ok())
    }

    /// Active services in boot order.
    pub fn services(&self) -> Vec<(ServiceId, SharedService)> {
        self.resolved.read().order.clone()
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ServiceId> = self.resolved.read().order.iter().map(|(id, _)| id.clone()).collect();
        f.debug_struct("ServiceManager")
            .field("booted", &self.is_booted())
            .field("services", &ids)
            .finish()
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        if self.is_booted() && !self.stopped.load(Ordering::Acquire) {
            warn!("ServiceManager dropped without shutdown");
        }
    }
}
