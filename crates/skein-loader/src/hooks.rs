//! Post-definition hooks run the first time a namespace materializes a unit.

use skein_core::{CodeUnit, UnitName};

/// Header line announcing a unit's configuration root.
pub const CONFIG_ROOT_MARKER: &str = "@config-root=";

/// Extracts the configuration-root marker from freshly decoded unit bytes.
pub trait UnitInspector: Send + Sync {
    fn config_root(&self, name: &UnitName, bytes: &[u8]) -> Option<String>;
}

/// Reads the marker from a leading `@config-root=<root>` header line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderInspector;

impl UnitInspector for HeaderInspector {
    fn config_root(&self, _name: &UnitName, bytes: &[u8]) -> Option<String> {
        let first_line = bytes.split(|b| *b == b'\n').next()?;
        let line = std::str::from_utf8(first_line).ok()?.trim();
        let root = line.strip_prefix(CONFIG_ROOT_MARKER)?.trim();
        (!root.is_empty()).then(|| root.to_string())
    }
}

/// Receives the configuration root of each marked unit.
pub trait ConfigInitializer: Send + Sync {
    fn initialize(&self, root: &str, unit: &CodeUnit);
}

/// Ignores every configuration root.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConfigInitializer;

impl ConfigInitializer for NoopConfigInitializer {
    fn initialize(&self, _root: &str, _unit: &CodeUnit) {}
}
