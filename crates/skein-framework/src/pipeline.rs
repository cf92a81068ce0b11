//! The transformation pipeline run on every code-unit load event.
//!
//! For one unit the [`Transformer`]:
//!
//! 1. skips units matched by the [`IgnoreRules`];
//! 2. asks the [`PluginFinder`] for the applicable definitions, in
//!    registration order;
//! 3. folds them over the unit image with a fresh [`EnhanceContext`]; a
//!    definition returning `None` leaves the current image untouched;
//! 4. reports [`TransformOutcome::Enhanced`] when any definition changed the
//!    image, [`TransformOutcome::Unmodified`] otherwise.
//!
//! A failing or panicking definition aborts the unit with a
//! [`TransformError`]; it stays enabled for every other unit.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skein_core::{
    BoxError, CodeSource, ContextId, EnhanceContext, EnhanceSite, EnhancementDescriptor,
    SharedInterceptor, SharedSource, UnitImage, UnitName, Weaver,
};
use tracing::{debug, error, trace, warn};

use crate::error::{TransformError, TransformResult, panic_message};
use crate::interceptor_cache::InterceptorCache;
use crate::plugin::PluginFinder;

/// Unit name prefix of the agent's own code, never enhanced.
pub const AGENT_UNIT_PREFIX: &str = "skein.";

// =============================================================================
// Collaborators
// =============================================================================

/// The host's "rewrite this unit before it is linked" mechanism.
pub trait Rewriter: Send + Sync {
    /// Weaves `interceptor` into the members of `image` selected by
    /// `enhancement`.  Returns `Ok(None)` when no member matched.
    fn rewrite(
        &self,
        image: &UnitImage,
        enhancement: &EnhancementDescriptor,
        interceptor: &SharedInterceptor,
    ) -> Result<Option<UnitImage>, BoxError>;
}

/// Result of transforming one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Unmodified,
    Enhanced(UnitImage),
}

impl TransformOutcome {
    pub fn is_enhanced(&self) -> bool {
        matches!(self, Self::Enhanced(_))
    }

    /// The replacement image, if any.
    pub fn into_image(self) -> Option<UnitImage> {
        match self {
            Self::Enhanced(image) => Some(image),
            Self::Unmodified => None,
        }
    }
}

// =============================================================================
// IgnoreRules
// =============================================================================

/// Unit name prefixes the pipeline never touches.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    prefixes: Vec<String>,
}

impl IgnoreRules {
    /// Ignores `prefixes` plus the agent's own units.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules: Vec<String> = vec![AGENT_UNIT_PREFIX.to_string()];
        for prefix in prefixes {
            let prefix = prefix.into();
            if !prefix.is_empty() && !rules.contains(&prefix) {
                rules.push(prefix);
            }
        }
        Self { prefixes: rules }
    }

    pub fn is_ignored(&self, unit: &UnitName) -> bool {
        self.prefixes.iter().any(|p| unit.starts_with(p))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

// =============================================================================
// Weaver over the interceptor cache
// =============================================================================

struct CacheWeaver<'a> {
    cache: &'a InterceptorCache,
    rewriter: &'a dyn Rewriter,
    target: Option<&'a SharedSource>,
}

impl Weaver for CacheWeaver<'_> {
    fn weave(
        &self,
        image: &UnitImage,
        enhancement: &EnhancementDescriptor,
    ) -> Result<Option<UnitImage>, BoxError> {
        let interceptor = self.cache.load(&enhancement.interceptor, self.target)?;
        self.rewriter.rewrite(image, enhancement, &interceptor)
    }
}

// =============================================================================
// Transformer
// =============================================================================

/// Applies the discovered plugins to code units as the host loads them.
pub struct Transformer {
    finder: PluginFinder,
    cache: Arc<InterceptorCache>,
    rewriter: Arc<dyn Rewriter>,
    ignore: IgnoreRules,
    dump_dir: Option<PathBuf>,
}

impl Transformer {
    pub fn new(finder: PluginFinder, cache: Arc<InterceptorCache>, rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            finder,
            cache,
            rewriter,
            ignore: IgnoreRules::default(),
            dump_dir: None,
        }
    }

    pub fn with_ignore_rules(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    /// Writes every enhanced image below `dir` for inspection.
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    pub fn finder(&self) -> &PluginFinder {
        &self.finder
    }

    pub fn cache(&self) -> &Arc<InterceptorCache> {
        &self.cache
    }

    /// Returns `true` if transforming `unit` could change it.
    pub fn matches(&self, unit: &UnitName) -> bool {
        !self.ignore.is_ignored(unit) && self.finder.matches(unit)
    }

    /// Transforms `unit` as loaded by `target` (`None` for the default
    /// namespace).
    pub fn transform(
        &self,
        unit: &UnitName,
        image: &UnitImage,
        target: Option<&SharedSource>,
    ) -> TransformResult<TransformOutcome> {
        if self.ignore.is_ignored(unit) {
            trace!(unit = %unit, "Unit ignored");
            return Ok(TransformOutcome::Unmodified);
        }
        let definitions = self.finder.find(unit);
        if definitions.is_empty() {
            return Ok(TransformOutcome::Unmodified);
        }

        let target_id: ContextId = match target {
            Some(t) => t.context_id().clone(),
            None => self.cache.default_namespace().id().clone(),
        };
        let weaver = CacheWeaver {
            cache: &self.cache,
            rewriter: self.rewriter.as_ref(),
            target,
        };
        let mut context = EnhanceContext::new();
        let mut current = image.clone();

        for definition in definitions {
            let outcome = {
                let mut site = EnhanceSite {
                    unit,
                    target: &target_id,
                    context: &mut context,
                    weaver: &weaver,
                };
                panic::catch_unwind(AssertUnwindSafe(|| definition.apply(&current, &mut site)))
            };

            match outcome {
                Ok(Ok(Some(next))) => {
                    debug!(unit = %unit, plugin = %definition.name(), "Plugin enhanced unit");
                    current = next;
                    context.mark_enhanced();
                }
                Ok(Ok(None)) => {
                    trace!(unit = %unit, plugin = %definition.name(), "Plugin left unit unchanged");
                }
                Ok(Err(source)) => {
                    let err = TransformError::Plugin {
                        unit: unit.clone(),
                        plugin: definition.name().to_string(),
                        source,
                    };
                    error!(error = %err, "Enhancement failed, unit left unmodified");
                    return Err(err);
                }
                Err(payload) => {
                    let err = TransformError::Panicked {
                        unit: unit.clone(),
                        plugin: definition.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    };
                    error!(error = %err, "Enhancement panicked, unit left unmodified");
                    return Err(err);
                }
            }
        }

        if !context.is_enhanced() {
            return Ok(TransformOutcome::Unmodified);
        }
        if let Some(dir) = &self.dump_dir {
            dump(dir, unit, &current);
        }
        Ok(TransformOutcome::Enhanced(current))
    }
}

fn dump(dir: &Path, unit: &UnitName, image: &UnitImage) {
    let path = dir.join(unit.to_path());
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&path, image.as_bytes()));
    match written {
        Ok(()) => debug!(unit = %unit, path = %path.display(), "Enhanced unit dumped"),
        Err(e) => warn!(unit = %unit, path = %path.display(), error = %e, "Failed to dump enhanced unit"),
    }
}
