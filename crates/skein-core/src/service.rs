//! Boot services: internal background components with a lifecycle.
//!
//! Every service is registered with a [`RegistrationKind`] that decides how it
//! competes with other registrations for the same identity:
//!
//! | Kind | Slot empty | Slot holds Default | Slot holds anything else |
//! |------|------------|--------------------|--------------------------|
//! | `Plain` | insert | conflict | conflict |
//! | `Default` | insert | dropped | dropped |
//! | `Override(t)` | insert provisionally | replace | conflict |

use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

// =============================================================================
// ServiceId
// =============================================================================

/// Nominal identity of a boot service.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Cow<'static, str>);

impl ServiceId {
    /// Creates an identity from a static string; usable in `static` items.
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Creates an identity from an owned string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ServiceId {
    fn from(id: &'static str) -> Self {
        Self::from_static(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// RegistrationKind
// =============================================================================

/// How a service registration competes for its identity slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationKind {
    /// The only implementation of its identity; duplicates are a conflict.
    Plain,
    /// Fallback implementation; the first one wins and an override replaces it.
    Default,
    /// Replaces the default registered under the target identity.
    Override(ServiceId),
}

impl RegistrationKind {
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Self::Override(_))
    }
}

// =============================================================================
// BootService
// =============================================================================

/// A background component booted and shut down by the service manager.
///
/// Phases run in priority order (lower first) on boot and in reverse on
/// shutdown.  A failing hook is logged and never stops sibling services.
#[async_trait]
pub trait BootService: Any + Send + Sync {
    /// Boot priority; lower values prepare and start earlier.
    fn priority(&self) -> i32 {
        0
    }

    /// First boot phase.
    async fn prepare(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Second boot phase.
    async fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs once every service has started.
    async fn on_complete(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs at agent shutdown, in reverse priority order.
    async fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Upcasts for typed lookups through the service manager.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared handle to a boot service.
pub type SharedService = Arc<dyn BootService>;
