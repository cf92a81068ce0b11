//! Structured plugin declarations (`skein-plugin.json`).
//!
//! A declaration file is a JSON array; each element describes one plugin
//! purely as data, without a defining unit:
//!
//! ```json
//! [
//!   {
//!     "name": "http-client",
//!     "target": { "any_of": ["com.acme.http.Client", { "prefix": "com.acme.http.pool." }] },
//!     "enhancements": [
//!       {
//!         "member": { "named": "execute" },
//!         "interceptor": "com.acme.plugins.HttpInterceptor",
//!         "kind": "instance_method"
//!       }
//!     ]
//!   }
//! ]
//! ```

use std::sync::Arc;

use serde::Deserialize;
use skein_core::{EnhancementDescriptor, PluginDefine, UnitMatch, UnitName};
use tracing::warn;

use super::definition::PluginDefinition;

/// Default declaration resource name.
pub const DEFAULT_DECLARATIONS: &str = "skein-plugin.json";

/// Target selector as written in a declaration.
///
/// A bare string names one unit exactly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeclaredTarget {
    Exact(String),
    Prefix { prefix: String },
    AnyOf { any_of: Vec<DeclaredTarget> },
}

impl DeclaredTarget {
    pub fn to_match(&self) -> UnitMatch {
        match self {
            Self::Exact(name) => UnitMatch::Named(UnitName::new(name)),
            Self::Prefix { prefix } => UnitMatch::Prefix(prefix.clone()),
            Self::AnyOf { any_of } => UnitMatch::any_of(any_of.iter().map(Self::to_match)),
        }
    }
}

/// One element of a declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub target: DeclaredTarget,
    #[serde(default)]
    pub enhancements: Vec<EnhancementDescriptor>,
}

impl Declaration {
    /// Turns the declaration into a definition labelled with `origin`.
    pub fn into_definition(self, origin: &str) -> PluginDefinition {
        let define = DeclaredDefine {
            selector: self.target.to_match(),
            enhancements: self.enhancements,
        };
        PluginDefinition::new(self.name, origin, Arc::new(define))
    }
}

/// Plugin behaviour built from a declaration; applies through the default
/// enhancement fold.
#[derive(Debug, Clone)]
pub struct DeclaredDefine {
    selector: UnitMatch,
    enhancements: Vec<EnhancementDescriptor>,
}

impl PluginDefine for DeclaredDefine {
    fn selector(&self) -> UnitMatch {
        self.selector.clone()
    }

    fn enhancements(&self) -> Vec<EnhancementDescriptor> {
        self.enhancements.clone()
    }
}

/// Parses a declaration file; `None` (logged) when it is not a valid array.
pub fn parse_declarations(origin: &str, bytes: &[u8]) -> Option<Vec<Declaration>> {
    match serde_json::from_slice(bytes) {
        Ok(declarations) => Some(declarations),
        Err(e) => {
            warn!(declarations = %origin, error = %e, "Invalid plugin declarations, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use skein_core::{EnhancementKind, MemberMatch, WeaveMode};

    use super::*;

    const SAMPLE: &str = r#"[
        {
            "name": "http",
            "target": { "any_of": ["com.acme.Client", { "prefix": "com.acme.pool." }] },
            "enhancements": [
                { "member": { "named": "execute" }, "interceptor": "i.Http", "kind": "instance_method" },
                { "member": "any", "interceptor": "i.Ctor", "kind": "constructor", "mode": "replace" }
            ]
        },
        { "name": "bare", "target": "com.acme.Bare" }
    ]"#;

    #[test]
    fn test_parse_declarations() {
        let declarations = parse_declarations("test", SAMPLE.as_bytes()).unwrap();
        assert_eq!(declarations.len(), 2);

        let http = &declarations[0];
        assert_eq!(http.enhancements.len(), 2);
        assert_eq!(http.enhancements[0].member, MemberMatch::Named("execute".into()));
        assert_eq!(http.enhancements[0].mode, WeaveMode::Wrap);
        assert_eq!(http.enhancements[1].kind, EnhancementKind::Constructor);
        assert_eq!(http.enhancements[1].mode, WeaveMode::Replace);

        let selector = http.target.to_match();
        assert!(selector.matches(&UnitName::new("com.acme.Client")));
        assert!(selector.matches(&UnitName::new("com.acme.pool.Conn")));
        assert!(!selector.matches(&UnitName::new("com.acme.Other")));

        assert!(declarations[1].enhancements.is_empty());
    }

    #[test]
    fn test_into_definition() {
        let mut declarations = parse_declarations("test", SAMPLE.as_bytes()).unwrap();
        let definition = declarations.remove(0).into_definition("archive:a.tar!/skein-plugin.json");
        assert_eq!(definition.name(), "http");
        assert_eq!(definition.identity(), "archive:a.tar!/skein-plugin.json");
        assert_eq!(definition.enhancements().len(), 2);
        assert!(definition.matches(&UnitName::new("com.acme.Client")));
    }

    #[test]
    fn test_invalid_declarations_are_dropped() {
        assert!(parse_declarations("test", b"{\"name\": 1}").is_none());
        assert!(parse_declarations("test", b"not json").is_none());
    }
}
