//! A discovered plugin definition.

use std::fmt;

use skein_core::{
    BoxError, EnhanceSite, EnhancementDescriptor, SharedDefine, UnitImage, UnitMatch, UnitName,
};

/// A plugin as discovered at attach time: its name, the identity it was
/// constructed from, and its behaviour.
///
/// The selector and enhancement list are captured once and never change.
pub struct PluginDefinition {
    name: String,
    identity: String,
    selector: UnitMatch,
    enhancements: Vec<EnhancementDescriptor>,
    define: SharedDefine,
}

impl PluginDefinition {
    pub fn new(name: impl Into<String>, identity: impl Into<String>, define: SharedDefine) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
            selector: define.selector(),
            enhancements: define.enhancements(),
            define,
        }
    }

    /// Name declared in the manifest (defaults to the identity).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the defining unit, or the declaration resource.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn selector(&self) -> &UnitMatch {
        &self.selector
    }

    pub fn enhancements(&self) -> &[EnhancementDescriptor] {
        &self.enhancements
    }

    pub fn define(&self) -> &SharedDefine {
        &self.define
    }

    pub fn matches(&self, unit: &UnitName) -> bool {
        self.selector.matches(unit)
    }

    /// Applies the plugin's behaviour to `image`.
    pub fn apply(
        &self,
        image: &UnitImage,
        site: &mut EnhanceSite<'_>,
    ) -> Result<Option<UnitImage>, BoxError> {
        self.define.apply(image, site)
    }
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("selector", &self.selector)
            .field("enhancements", &self.enhancements.len())
            .finish()
    }
}
