//! Serves `plugin.config` sections to units that announce a configuration root.
//!
//! A unit whose image starts with `@config-root=http.client` is handed the
//! section found under that root the first time its namespace defines it.
//! Roots are tried as a literal key first (`[plugin.config."http.client"]`),
//! then as a path into nested tables (`[plugin.config.http.client]`).

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use skein_core::{CodeUnit, UnitName};
use skein_loader::ConfigInitializer;
use tracing::{debug, trace};

use crate::config::{ConfigError, ConfigResult};

/// Configuration sections for plugin code, keyed by root.
#[derive(Debug, Default)]
pub struct PluginConfigStore {
    sections: BTreeMap<String, Value>,
    initialized: RwLock<HashMap<String, Vec<UnitName>>>,
}

impl PluginConfigStore {
    pub fn new(sections: BTreeMap<String, Value>) -> Self {
        Self {
            sections,
            initialized: RwLock::new(HashMap::new()),
        }
    }

    /// The raw section under `root`, if any.
    pub fn section(&self, root: &str) -> Option<&Value> {
        if let Some(section) = self.sections.get(root) {
            return Some(section);
        }
        let mut parts = root.split('.');
        let mut current = self.sections.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Deserializes the section under `root` into `T`.
    ///
    /// Returns `Ok(None)` when no section exists.
    pub fn get<T: DeserializeOwned>(&self, root: &str) -> ConfigResult<Option<T>> {
        let Some(section) = self.section(root) else {
            return Ok(None);
        };
        T::deserialize(section)
            .map(Some)
            .map_err(|e| ConfigError::invalid_section(root, e.to_string()))
    }

    /// Returns `true` once a unit announcing `root` has been defined.
    pub fn is_initialized(&self, root: &str) -> bool {
        self.initialized.read().contains_key(root)
    }

    /// Units that announced `root`, in definition order.
    pub fn units_for(&self, root: &str) -> Vec<UnitName> {
        self.initialized.read().get(root).cloned().unwrap_or_default()
    }
}

impl ConfigInitializer for PluginConfigStore {
    fn initialize(&self, root: &str, unit: &CodeUnit) {
        let found = self.section(root).is_some();
        self.initialized
            .write()
            .entry(root.to_string())
            .or_default()
            .push(unit.name().clone());
        if found {
            debug!(root = %root, unit = %unit.name(), "Plugin configuration section bound");
        } else {
            trace!(root = %root, unit = %unit.name(), "No configuration section for root, using plugin defaults");
        }
    }
}
