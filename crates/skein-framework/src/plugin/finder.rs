//! Lookup of the definitions applicable to a code unit.

use std::collections::HashMap;

use skein_core::UnitName;

use super::definition::PluginDefinition;

/// Index over the discovered definitions.
///
/// Definitions whose selector names units exactly are indexed by name; the
/// rest are probed one by one.  Lookups always return registration order.
#[derive(Debug, Default)]
pub struct PluginFinder {
    definitions: Vec<PluginDefinition>,
    by_name: HashMap<UnitName, Vec<usize>>,
    indirect: Vec<usize>,
}

impl PluginFinder {
    pub fn new(definitions: Vec<PluginDefinition>) -> Self {
        let mut by_name: HashMap<UnitName, Vec<usize>> = HashMap::new();
        let mut indirect = Vec::new();
        for (i, definition) in definitions.iter().enumerate() {
            match definition.selector().exact_names() {
                Some(names) => {
                    for name in names {
                        let slot = by_name.entry(name).or_default();
                        if slot.last() != Some(&i) {
                            slot.push(i);
                        }
                    }
                }
                None => indirect.push(i),
            }
        }
        Self {
            definitions,
            by_name,
            indirect,
        }
    }

    /// Definitions applicable to `unit`, in registration order.
    pub fn find(&self, unit: &UnitName) -> Vec<&PluginDefinition> {
        let mut hits: Vec<usize> = self.by_name.get(unit).cloned().unwrap_or_default();
        hits.extend(
            self.indirect
                .iter()
                .copied()
                .filter(|&i| self.definitions[i].matches(unit)),
        );
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.definitions[i]).collect()
    }

    /// Returns `true` if at least one definition applies to `unit`.
    pub fn matches(&self, unit: &UnitName) -> bool {
        self.by_name.contains_key(unit)
            || self
                .indirect
                .iter()
                .any(|&i| self.definitions[i].matches(unit))
    }

    pub fn definitions(&self) -> &[PluginDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
