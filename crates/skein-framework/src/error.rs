//! Error types for the Skein framework.

use skein_core::{BoxError, ConstructError, ContextId, ServiceId, UnitName};
use thiserror::Error;

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// Errors returned by the service manager.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Two registrations compete for one identity and neither may yield.
    #[error("service conflict on '{id}': {reason}")]
    Conflict {
        /// Identity of the contested slot.
        id: ServiceId,
        /// Human-readable description of the clash.
        reason: String,
    },

    /// `boot()` was called on a manager that already booted.
    #[error("service manager already booted")]
    AlreadyBooted,
}

impl LifecycleError {
    pub fn conflict(id: &ServiceId, reason: impl Into<String>) -> Self {
        Self::Conflict {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

// =============================================================================
// Load Errors
// =============================================================================

/// An interceptor could not be constructed for a target context.
///
/// Nothing is cached on failure, so a later load may succeed.
#[derive(Debug, Error)]
#[error("failed to load interceptor '{interceptor}' for context '{context}': {source}")]
pub struct LoadError {
    pub interceptor: String,
    pub context: ContextId,
    #[source]
    pub source: ConstructError,
}

/// Result type for interceptor loads.
pub type LoadResult<T> = Result<T, LoadError>;

// =============================================================================
// Transform Errors
// =============================================================================

/// One plugin definition failed while transforming a code unit.
///
/// The unit is left unmodified; the plugin stays enabled for other units.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The definition returned an error.
    #[error("plugin '{plugin}' failed to enhance {unit}: {source}")]
    Plugin {
        unit: UnitName,
        plugin: String,
        #[source]
        source: BoxError,
    },

    /// The definition panicked.
    #[error("plugin '{plugin}' panicked while enhancing {unit}: {message}")]
    Panicked {
        unit: UnitName,
        plugin: String,
        message: String,
    },
}

impl TransformError {
    /// Name of the unit whose transformation was aborted.
    pub fn unit(&self) -> &UnitName {
        match self {
            Self::Plugin { unit, .. } | Self::Panicked { unit, .. } => unit,
        }
    }

    /// Name of the plugin definition that failed.
    pub fn plugin(&self) -> &str {
        match self {
            Self::Plugin { plugin, .. } | Self::Panicked { plugin, .. } => plugin,
        }
    }
}

/// Result type for transformations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
