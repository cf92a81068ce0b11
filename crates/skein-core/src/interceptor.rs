//! Interceptors: the plugin-contributed objects woven into enhanced code.
//!
//! An interceptor is constructed once per (interceptor identity, target
//! context) pair by the interceptor cache and then invoked by the code the
//! host's rewriter produced.  What an interceptor records is plugin business;
//! the agent only cares about constructing and sharing it.

use std::any::Any;
use std::sync::Arc;

use crate::define::EnhancementKind;
use crate::error::BoxError;
use crate::unit::UnitName;

/// Describes the intercepted call handed to each hook.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// Unit owning the intercepted member.
    pub unit: &'a UnitName,
    /// Name of the intercepted member.
    pub member: &'a str,
    /// Kind of member being intercepted.
    pub kind: EnhancementKind,
}

/// A plugin-contributed interceptor.
///
/// All hooks default to no-ops so interceptors only implement what they use.
pub trait Interceptor: Send + Sync + 'static {
    /// Runs before the intercepted member body.
    fn before(&self, _site: &CallSite<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after the intercepted member body returned normally.
    fn after(&self, _site: &CallSite<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs when the intercepted member body failed.
    fn on_error(&self, _site: &CallSite<'_>, _error: &(dyn std::error::Error + 'static)) {}

    /// Upcasts for downcasting to the concrete interceptor type.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared handle to an interceptor instance.
pub type SharedInterceptor = Arc<dyn Interceptor>;
