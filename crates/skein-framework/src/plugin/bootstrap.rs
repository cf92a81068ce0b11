//! Attach-time plugin discovery.
//!
//! [`PluginBootstrap::load`] builds the plugin list from two sources visible
//! through the default namespace:
//!
//! 1. every manifest resource (`skein-plugin.def`); each entry is constructed
//!    by name through the namespace;
//! 2. every structured declaration resource (`skein-plugin.json`).
//!
//! Results are concatenated in that order.  Failures only ever drop the
//! manifest, declaration file or definition concerned.

use std::collections::HashSet;
use std::sync::Arc;

use skein_loader::IsolatedNamespace;
use tracing::{debug, error, info, warn};

use super::definition::PluginDefinition;
use super::manifest::{DEFAULT_MANIFEST, ManifestEntry, parse_manifest_bytes};
use super::structured::{DEFAULT_DECLARATIONS, parse_declarations};

/// Discovers and instantiates plugin definitions.
pub struct PluginBootstrap {
    namespace: Arc<IsolatedNamespace>,
    manifest: String,
    declarations: String,
    exclude: HashSet<String>,
}

impl PluginBootstrap {
    pub fn new(namespace: Arc<IsolatedNamespace>) -> Self {
        Self {
            namespace,
            manifest: DEFAULT_MANIFEST.to_string(),
            declarations: DEFAULT_DECLARATIONS.to_string(),
            exclude: HashSet::new(),
        }
    }

    /// Overrides the manifest resource name.
    pub fn with_manifest(mut self, name: impl Into<String>) -> Self {
        self.manifest = name.into();
        self
    }

    /// Overrides the declaration resource name.
    pub fn with_declarations(mut self, name: impl Into<String>) -> Self {
        self.declarations = name.into();
        self
    }

    /// Plugin names to leave out.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Loads every plugin definition, manifest-derived first.
    pub fn load(&self) -> Vec<PluginDefinition> {
        let mut plugins = self.load_manifests();
        let manifest_count = plugins.len();
        plugins.extend(self.load_declarations());

        info!(
            total = plugins.len(),
            from_manifests = manifest_count,
            from_declarations = plugins.len() - manifest_count,
            "Plugins loaded"
        );
        plugins
    }

    fn is_excluded(&self, name: &str) -> bool {
        let excluded = self.exclude.contains(name);
        if excluded {
            info!(plugin = %name, "Plugin excluded by configuration");
        }
        excluded
    }

    // ─── Manifests ──────────────────────────────────────────────

    fn manifest_entries(&self) -> Vec<ManifestEntry> {
        let resources = self.namespace.resources(&self.manifest);
        if resources.is_empty() {
            info!(manifest = %self.manifest, "No plugin manifests found, continuing without manifest plugins");
            return Vec::new();
        }

        let mut entries = Vec::new();
        for location in resources {
            let origin = location.to_string();
            match self.namespace.read_resource(&location) {
                Ok(bytes) => {
                    if let Some(parsed) = parse_manifest_bytes(&origin, &bytes) {
                        debug!(manifest = %origin, entries = parsed.len(), "Manifest parsed");
                        entries.extend(parsed);
                    }
                }
                Err(e) => error!(manifest = %origin, error = %e, "Failed to read plugin manifest"),
            }
        }
        entries
    }

    fn load_manifests(&self) -> Vec<PluginDefinition> {
        self.manifest_entries()
            .into_iter()
            .filter(|entry| !self.is_excluded(&entry.name))
            .filter_map(|entry| {
                debug!(plugin = %entry.name, identity = %entry.identity, "Loading plugin define");
                match self.namespace.instantiate_define(&entry.identity) {
                    Ok(define) => Some(PluginDefinition::new(entry.name, entry.identity, define)),
                    Err(e) => {
                        error!(plugin = %entry.name, identity = %entry.identity, error = %e, "Failed to load plugin");
                        None
                    }
                }
            })
            .collect()
    }

    // ─── Structured declarations ────────────────────────────────

    fn load_declarations(&self) -> Vec<PluginDefinition> {
        let mut plugins = Vec::new();
        for location in self.namespace.resources(&self.declarations) {
            let origin = location.to_string();
            let bytes = match self.namespace.read_resource(&location) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(declarations = %origin, error = %e, "Failed to read plugin declarations");
                    continue;
                }
            };
            let Some(declarations) = parse_declarations(&origin, &bytes) else {
                continue;
            };
            plugins.extend(
                declarations
                    .into_iter()
                    .filter(|d| !self.is_excluded(&d.name))
                    .map(|d| d.into_definition(&origin)),
            );
        }
        plugins
    }
}
