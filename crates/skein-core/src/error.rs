//! Unified error types for the Skein core.
//!
//! Plugin- and service-authored code reports failures as [`BoxError`]; the
//! agent's own failure modes are typed enums so callers can tell a missing
//! code unit apart from a broken factory.

use thiserror::Error;

use crate::unit::UnitName;

/// Boxed error returned by plugin-authored code (factories, hooks, apply steps).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Resolve Errors
// =============================================================================

/// Errors that can occur while resolving a code unit from a code source.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Every source (archives, then the parent link) was exhausted.
    #[error("code unit not found: {0}")]
    NotFound(UnitName),

    /// The requested identity is not a well-formed dotted name.
    #[error("invalid code unit name: '{0}'")]
    InvalidName(String),
}

/// Result type for resolve operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

// =============================================================================
// Construct Errors
// =============================================================================

/// Errors that can occur while constructing a registered object by name.
#[derive(Debug, Error)]
pub enum ConstructError {
    /// The defining code unit could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// No factory is registered under the identity.
    #[error("no factory registered for '{0}'")]
    NoFactory(String),

    /// The factory ran and returned an error.
    #[error("factory for '{identity}' failed: {source}")]
    Factory {
        /// Identity of the object being constructed.
        identity: String,
        /// Error reported by the factory.
        #[source]
        source: BoxError,
    },
}

impl ConstructError {
    /// Creates a factory failure for `identity`.
    pub fn factory(identity: impl Into<String>, source: BoxError) -> Self {
        Self::Factory {
            identity: identity.into(),
            source,
        }
    }
}

/// Result type for construct operations.
pub type ConstructResult<T> = Result<T, ConstructError>;
