//! Code units and the identities used to address them.

use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ResolveError;

/// File extension of a code unit entry inside an archive.
pub const UNIT_EXTENSION: &str = "unit";

// =============================================================================
// UnitName
// =============================================================================

/// Fully-qualified, dot-separated identity of a code unit (`com.acme.Client`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitName(Arc<str>);

impl UnitName {
    /// Creates a name without validating it.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Creates a name, rejecting empty segments and characters outside
    /// `[A-Za-z0-9_$-]`.
    pub fn parse(name: &str) -> Result<Self, ResolveError> {
        let valid = !name.is_empty()
            && name.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-'))
            });
        if valid {
            Ok(Self::new(name))
        } else {
            Err(ResolveError::InvalidName(name.to_string()))
        }
    }

    /// Recovers a name from its canonical archive path (`a/b/C.unit`).
    pub fn from_path(path: &str) -> Option<Self> {
        path.strip_suffix(UNIT_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .map(|stem| Self::new(stem.replace('/', ".")))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical archive path of this unit: `com.acme.Client` → `com/acme/Client.unit`.
    pub fn to_path(&self) -> String {
        format!("{}.{UNIT_EXTENSION}", self.0.replace('.', "/"))
    }

    /// Returns `true` if the name starts with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitName({})", self.0)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for UnitName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UnitName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// ContextId
// =============================================================================

/// Identity of a loading context (a host subsystem or an isolated namespace).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Arc<str>);

impl ContextId {
    /// Creates a context identity.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// UnitImage
// =============================================================================

/// Binary representation of a code unit as it flows through the pipeline.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UnitImage(Arc<[u8]>);

impl UnitImage {
    /// Wraps raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the byte length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if both images share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UnitImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitImage({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for UnitImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for UnitImage {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl AsRef<[u8]> for UnitImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// ResourceLocation
// =============================================================================

/// Location of an entry inside a mounted archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    /// Path of the archive file on disk.
    pub archive: PathBuf,
    /// Entry path inside the archive.
    pub entry: String,
}

impl ResourceLocation {
    /// Creates a location.
    pub fn new(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            entry: entry.into(),
        }
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive:{}!/{}", self.archive.display(), self.entry)
    }
}

// =============================================================================
// CodeUnit
// =============================================================================

/// Where a materialized code unit came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOrigin {
    /// Decoded from a mounted archive.
    Archive(ResourceLocation),
    /// Supplied by another loading context.
    Context(ContextId),
    /// Supplied from memory (host-provided sources, tests).
    Memory,
}

/// A code unit materialized by a code source.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    name: UnitName,
    image: UnitImage,
    origin: UnitOrigin,
    config_root: Option<String>,
}

impl CodeUnit {
    /// Creates a unit with no configuration-root marker.
    pub fn new(name: UnitName, image: UnitImage, origin: UnitOrigin) -> Self {
        Self {
            name,
            image,
            origin,
            config_root: None,
        }
    }

    /// Attaches the configuration-root marker found on this unit.
    pub fn with_config_root(mut self, root: Option<String>) -> Self {
        self.config_root = root;
        self
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn image(&self) -> &UnitImage {
        &self.image
    }

    pub fn origin(&self) -> &UnitOrigin {
        &self.origin
    }

    /// Configuration root declared by the unit, if any.
    pub fn config_root(&self) -> Option<&str> {
        self.config_root.as_deref()
    }
}
