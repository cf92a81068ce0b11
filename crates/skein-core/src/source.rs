//! Code sources: anything that can resolve a code unit by name.
//!
//! Isolated namespaces, host loading contexts and in-memory fixtures all
//! implement [`CodeSource`].  Namespaces compose into chains through a single
//! parent link, so a source only ever needs to answer for itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ResolveError, ResolveResult};
use crate::unit::{CodeUnit, ContextId, ResourceLocation, UnitImage, UnitName, UnitOrigin};

/// A layer able to resolve code units by identity.
pub trait CodeSource: Send + Sync {
    /// Identity of this loading context.
    fn context_id(&self) -> &ContextId;

    /// Resolves (and, for lazy sources, materializes) the named unit.
    fn resolve(&self, name: &UnitName) -> ResolveResult<Arc<CodeUnit>>;

    /// Returns every resource visible under `path`, in search order.
    fn resources(&self, _path: &str) -> Vec<ResourceLocation> {
        Vec::new()
    }
}

/// Shared handle to a code source.
pub type SharedSource = Arc<dyn CodeSource>;

// =============================================================================
// MemorySource
// =============================================================================

/// A code source backed by an in-memory table.
///
/// Hosts use it to expose a loading context whose units are already known;
/// it is also the usual parent link in tests.
pub struct MemorySource {
    id: ContextId,
    units: RwLock<HashMap<UnitName, Arc<CodeUnit>>>,
}

impl MemorySource {
    /// Creates an empty source with the given context identity.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: ContextId::new(id),
            units: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a unit and returns `self` for chaining.
    pub fn with_unit(self, name: impl Into<UnitName>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Adds or replaces a unit.
    pub fn insert(&self, name: impl Into<UnitName>, bytes: impl Into<Vec<u8>>) {
        let name = name.into();
        let unit = CodeUnit::new(name.clone(), UnitImage::new(bytes), UnitOrigin::Memory);
        self.units.write().insert(name, Arc::new(unit));
    }

    /// Number of units held.
    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    /// Returns `true` if no unit is held.
    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }
}

impl CodeSource for MemorySource {
    fn context_id(&self) -> &ContextId {
        &self.id
    }

    fn resolve(&self, name: &UnitName) -> ResolveResult<Arc<CodeUnit>> {
        self.units
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_resolves_inserted_units() {
        let source = MemorySource::new("host").with_unit("com.acme.Client", b"client".to_vec());
        let unit = source.resolve(&UnitName::new("com.acme.Client")).unwrap();
        assert_eq!(unit.image().as_bytes(), b"client");
        assert_eq!(unit.origin(), &UnitOrigin::Memory);
        assert_eq!(source.context_id().as_str(), "host");
    }

    #[test]
    fn test_memory_source_reports_missing_units() {
        let source = MemorySource::new("host");
        let err = source.resolve(&UnitName::new("com.acme.Missing")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(name) if name.as_str() == "com.acme.Missing"));
    }
}
