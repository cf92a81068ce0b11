//! Plugin definitions: which code units a plugin enhances and how.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::unit::{ContextId, UnitImage, UnitName};

// =============================================================================
// Selectors
// =============================================================================

type UnitPredicate = Arc<dyn Fn(&UnitName) -> bool + Send + Sync>;

/// Selector predicate over code-unit identities.
#[derive(Clone)]
pub enum UnitMatch {
    /// Exactly this unit.
    Named(UnitName),
    /// Every unit whose name starts with the prefix.
    Prefix(String),
    /// Any of the inner selectors.
    AnyOf(Vec<UnitMatch>),
    /// Arbitrary predicate.
    Predicate(UnitPredicate),
}

impl UnitMatch {
    pub fn named(name: impl Into<UnitName>) -> Self {
        Self::Named(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    pub fn any_of(selectors: impl IntoIterator<Item = UnitMatch>) -> Self {
        Self::AnyOf(selectors.into_iter().collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&UnitName) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn matches(&self, name: &UnitName) -> bool {
        match self {
            Self::Named(expected) => expected == name,
            Self::Prefix(prefix) => name.starts_with(prefix),
            Self::AnyOf(inner) => inner.iter().any(|m| m.matches(name)),
            Self::Predicate(f) => f(name),
        }
    }

    /// The exact names this selector matches, when it matches nothing else.
    ///
    /// Used to index definitions by name instead of probing every selector.
    pub fn exact_names(&self) -> Option<Vec<UnitName>> {
        match self {
            Self::Named(name) => Some(vec![name.clone()]),
            Self::AnyOf(inner) => {
                let mut names = Vec::new();
                for m in inner {
                    names.extend(m.exact_names()?);
                }
                Some(names)
            }
            Self::Prefix(_) | Self::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for UnitMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Named({name})"),
            Self::Prefix(prefix) => write!(f, "Prefix({prefix})"),
            Self::AnyOf(inner) => f.debug_tuple("AnyOf").field(inner).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Selector over member names inside a code unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberMatch {
    Named(String),
    Prefix(String),
    Any,
}

impl MemberMatch {
    pub fn matches(&self, member: &str) -> bool {
        match self {
            Self::Named(name) => name == member,
            Self::Prefix(prefix) => member.starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

// =============================================================================
// EnhancementDescriptor
// =============================================================================

/// Kind of member an enhancement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementKind {
    InstanceMethod,
    Constructor,
    StaticMethod,
}

/// Whether the interceptor wraps the original body or replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaveMode {
    #[default]
    Wrap,
    Replace,
}

/// One enhancement contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementDescriptor {
    /// Members of the unit the enhancement applies to.
    pub member: MemberMatch,
    /// Identity of the interceptor woven into those members.
    pub interceptor: String,
    pub kind: EnhancementKind,
    #[serde(default)]
    pub mode: WeaveMode,
}

impl EnhancementDescriptor {
    /// Wraps matching instance methods with `interceptor`.
    pub fn instance_method(member: MemberMatch, interceptor: impl Into<String>) -> Self {
        Self {
            member,
            interceptor: interceptor.into(),
            kind: EnhancementKind::InstanceMethod,
            mode: WeaveMode::Wrap,
        }
    }

    /// Wraps matching static methods with `interceptor`.
    pub fn static_method(member: MemberMatch, interceptor: impl Into<String>) -> Self {
        Self {
            kind: EnhancementKind::StaticMethod,
            ..Self::instance_method(member, interceptor)
        }
    }

    /// Runs `interceptor` after every constructor.
    pub fn constructor(interceptor: impl Into<String>) -> Self {
        Self {
            kind: EnhancementKind::Constructor,
            ..Self::instance_method(MemberMatch::Any, interceptor)
        }
    }

    /// Switches the enhancement to body replacement.
    pub fn replacing(mut self) -> Self {
        self.mode = WeaveMode::Replace;
        self
    }
}

// =============================================================================
// Enhance context and site
// =============================================================================

/// Per-attempt state shared by every plugin applied to one code unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceContext {
    enhanced: bool,
}

impl EnhanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any plugin changed the unit during this attempt.
    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    pub fn mark_enhanced(&mut self) {
        self.enhanced = true;
    }
}

/// Weaves a single enhancement into a unit image.
///
/// The pipeline implements this on top of the interceptor cache and the
/// host's rewrite mechanism.
pub trait Weaver {
    /// Returns `Ok(None)` when the enhancement does not change the image.
    fn weave(
        &self,
        image: &UnitImage,
        enhancement: &EnhancementDescriptor,
    ) -> Result<Option<UnitImage>, BoxError>;
}

/// Everything a plugin's apply step sees besides the current image.
pub struct EnhanceSite<'a> {
    /// Unit being transformed.
    pub unit: &'a UnitName,
    /// Context that would load the unit without enhancement.
    pub target: &'a ContextId,
    /// Shared per-attempt state.
    pub context: &'a mut EnhanceContext,
    /// Weaver bound to the target context.
    pub weaver: &'a dyn Weaver,
}

// =============================================================================
// PluginDefine
// =============================================================================

/// Behaviour of a plugin definition.
pub trait PluginDefine: Send + Sync {
    /// Code units this plugin applies to.
    fn selector(&self) -> UnitMatch;

    /// Enhancements applied, in order, by the default [`apply`](Self::apply).
    fn enhancements(&self) -> Vec<EnhancementDescriptor> {
        Vec::new()
    }

    /// Applies the plugin to `image`.
    ///
    /// Returns `Ok(None)` when nothing changed.  The default implementation
    /// folds [`enhancements`](Self::enhancements) through the site's weaver.
    fn apply(
        &self,
        image: &UnitImage,
        site: &mut EnhanceSite<'_>,
    ) -> Result<Option<UnitImage>, BoxError> {
        let mut current: Option<UnitImage> = None;
        for enhancement in self.enhancements() {
            let input = current.as_ref().unwrap_or(image);
            if let Some(next) = site.weaver.weave(input, &enhancement)? {
                current = Some(next);
            }
        }
        Ok(current)
    }
}

/// Shared handle to a plugin definition's behaviour.
pub type SharedDefine = Arc<dyn PluginDefine>;
