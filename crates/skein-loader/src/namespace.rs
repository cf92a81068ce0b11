//! Isolated code-loading namespaces.
//!
//! # Resolution order
//!
//! ```text
//! resolve("com.acme.Client")
//!   │
//!   ├─▶ archives of mount[0], then mount[1], ...   (first match wins)
//!   │     └─ decode + define once per namespace, run post-definition hook
//!   │
//!   └─▶ parent link (if any)                        (host symbols on demand)
//! ```
//!
//! The archive set is scanned lazily on first use and frozen afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use skein_core::{
    CodeSource, CodeUnit, ConstructContext, ConstructResult, ContextId, FactoryRegistry,
    Interceptor, PluginDefine, ResolveError, ResolveResult, ResourceLocation, SharedSource,
    UnitImage, UnitName, UnitOrigin,
};
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveHandle};
use crate::error::ArchiveResult;
use crate::hooks::{ConfigInitializer, HeaderInspector, NoopConfigInitializer, UnitInspector};

type DefinitionSlot = Arc<Mutex<Option<Arc<CodeUnit>>>>;

/// A namespace over mounted plugin archives with an optional parent link.
pub struct IsolatedNamespace {
    id: ContextId,
    mounts: Arc<[PathBuf]>,
    archives: OnceLock<Vec<ArchiveHandle>>,
    scan_lock: Mutex<()>,
    scans: AtomicUsize,
    definitions: Mutex<HashMap<UnitName, DefinitionSlot>>,
    parent: Option<SharedSource>,
    registry: Arc<FactoryRegistry>,
    inspector: Arc<dyn UnitInspector>,
    config: Arc<dyn ConfigInitializer>,
}

impl IsolatedNamespace {
    /// Creates a namespace over `mounts`, searched in the given order.
    pub fn new(
        id: impl AsRef<str>,
        mounts: impl IntoIterator<Item = PathBuf>,
        registry: Arc<FactoryRegistry>,
    ) -> Self {
        Self {
            id: ContextId::new(id),
            mounts: mounts.into_iter().collect(),
            archives: OnceLock::new(),
            scan_lock: Mutex::new(()),
            scans: AtomicUsize::new(0),
            definitions: Mutex::new(HashMap::new()),
            parent: None,
            registry,
            inspector: Arc::new(HeaderInspector),
            config: Arc::new(NoopConfigInitializer),
        }
    }

    /// Sets the parent link consulted after the local archives.
    pub fn with_parent(mut self, parent: SharedSource) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn UnitInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_config_initializer(mut self, config: Arc<dyn ConfigInitializer>) -> Self {
        self.config = config;
        self
    }

    /// Creates a sibling namespace over the same mounts, registry and hooks,
    /// linked to `parent`.
    ///
    /// The bridge scans its archives independently of `self`.
    pub fn bridge(&self, id: impl AsRef<str>, parent: SharedSource) -> Self {
        Self {
            id: ContextId::new(id),
            mounts: Arc::clone(&self.mounts),
            archives: OnceLock::new(),
            scan_lock: Mutex::new(()),
            scans: AtomicUsize::new(0),
            definitions: Mutex::new(HashMap::new()),
            parent: Some(parent),
            registry: Arc::clone(&self.registry),
            inspector: Arc::clone(&self.inspector),
            config: Arc::clone(&self.config),
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn mounts(&self) -> &[PathBuf] {
        &self.mounts
    }

    pub fn parent(&self) -> Option<&SharedSource> {
        self.parent.as_ref()
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// How many times the archive set was scanned (0 or 1).
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Acquire)
    }

    /// The frozen archive set, scanning on first use.
    pub fn archives(&self) -> &[ArchiveHandle] {
        if let Some(archives) = self.archives.get() {
            return archives;
        }
        let _guard = self.scan_lock.lock();
        self.archives.get_or_init(|| {
            let archives = archive::scan_mounts(&self.mounts);
            self.scans.fetch_add(1, Ordering::AcqRel);
            for handle in &archives {
                info!(namespace = %self.id, archive = %handle.path().display(), "Archive mounted");
            }
            archives
        })
    }

    // ─── Resources ──────────────────────────────────────────────

    /// First location of `path`, local archives first, then the parent.
    pub fn resource(&self, path: &str) -> Option<ResourceLocation> {
        self.local_resources(path).next().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.resources(path).into_iter().next())
        })
    }

    /// Every location of `path`: local archives in mount order, then the
    /// parent's results.
    pub fn resources(&self, path: &str) -> Vec<ResourceLocation> {
        let mut found: Vec<_> = self.local_resources(path).collect();
        if let Some(parent) = &self.parent {
            found.extend(parent.resources(path));
        }
        found
    }

    /// Decodes a located resource.
    pub fn read_resource(&self, location: &ResourceLocation) -> ArchiveResult<Vec<u8>> {
        archive::read_entry(&location.archive, &location.entry)
    }

    fn local_resources<'a>(&'a self, path: &'a str) -> impl Iterator<Item = ResourceLocation> + 'a {
        self.archives()
            .iter()
            .filter(move |handle| handle.contains(path))
            .map(move |handle| ResourceLocation::new(handle.path(), path))
    }

    // ─── Definition ─────────────────────────────────────────────

    fn definition_slot(&self, name: &UnitName) -> DefinitionSlot {
        let mut definitions = self.definitions.lock();
        Arc::clone(definitions.entry(name.clone()).or_default())
    }

    /// Looks the unit up in the local archives and defines it at most once.
    ///
    /// Slots exist only for names some local archive holds, so misses that
    /// fall through to the parent leave no trace.
    fn define_local(&self, name: &UnitName) -> Option<Arc<CodeUnit>> {
        let path = name.to_path();
        if !self.archives().iter().any(|h| h.contains(&path)) {
            return None;
        }

        let slot = self.definition_slot(name);
        let mut defined = slot.lock();
        if let Some(unit) = defined.as_ref() {
            return Some(Arc::clone(unit));
        }

        for handle in self.archives().iter().filter(|h| h.contains(&path)) {
            let bytes = match handle.read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(namespace = %self.id, unit = %name, error = %e, "Failed to decode unit, trying next archive");
                    continue;
                }
            };
            let unit = Arc::new(self.materialize(name, handle.path(), &path, bytes));
            *defined = Some(Arc::clone(&unit));
            return Some(unit);
        }
        None
    }

    fn materialize(&self, name: &UnitName, archive: &Path, entry: &str, bytes: Vec<u8>) -> CodeUnit {
        let config_root = self.inspector.config_root(name, &bytes);
        let origin = UnitOrigin::Archive(ResourceLocation::new(archive, entry));
        let unit = CodeUnit::new(name.clone(), UnitImage::new(bytes), origin)
            .with_config_root(config_root);

        debug!(namespace = %self.id, unit = %name, "Unit defined");
        if let Some(root) = unit.config_root() {
            self.config.initialize(root, &unit);
        }
        unit
    }

    // ─── Construct by name ──────────────────────────────────────

    /// Resolves `identity` and constructs its plugin definition.
    pub fn instantiate_define(&self, identity: &str) -> ConstructResult<Arc<dyn PluginDefine>> {
        let unit = self.resolve(&UnitName::parse(identity)?)?;
        self.registry.construct_define(&ConstructContext {
            identity,
            unit: Some(&unit),
            source: Some(self),
        })
    }

    /// Resolves `identity` and constructs its interceptor.
    pub fn instantiate_interceptor(&self, identity: &str) -> ConstructResult<Arc<dyn Interceptor>> {
        let unit = self.resolve(&UnitName::parse(identity)?)?;
        self.registry.construct_interceptor(&ConstructContext {
            identity,
            unit: Some(&unit),
            source: Some(self),
        })
    }
}

impl CodeSource for IsolatedNamespace {
    fn context_id(&self) -> &ContextId {
        &self.id
    }

    fn resolve(&self, name: &UnitName) -> ResolveResult<Arc<CodeUnit>> {
        if let Some(unit) = self.define_local(name) {
            return Ok(unit);
        }
        match &self.parent {
            Some(parent) => parent.resolve(name),
            None => Err(ResolveError::NotFound(name.clone())),
        }
    }

    fn resources(&self, path: &str) -> Vec<ResourceLocation> {
        IsolatedNamespace::resources(self, path)
    }
}

impl fmt::Debug for IsolatedNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedNamespace")
            .field("id", &self.id)
            .field("mounts", &self.mounts)
            .field("parent", &self.parent.as_ref().map(|p| p.context_id()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Barrier;
    use std::thread;

    use skein_core::{BoxError, MemorySource, UnitMatch};

    use super::*;
    use crate::archive::testing::write_archive;

    fn namespace(mounts: &[PathBuf]) -> IsolatedNamespace {
        IsolatedNamespace::new("plugins", mounts.to_vec(), Arc::new(FactoryRegistry::new()))
    }

    #[derive(Default)]
    struct CountingConfig {
        roots: Mutex<Vec<String>>,
    }

    impl ConfigInitializer for CountingConfig {
        fn initialize(&self, root: &str, _unit: &CodeUnit) {
            self.roots.lock().push(root.to_string());
        }
    }

    #[test]
    fn test_resolve_defines_once() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "a.tar", &[("com/acme/Client.unit", b"client")]);
        let ns = namespace(&[dir.path().to_path_buf()]);

        let first = ns.resolve(&UnitName::new("com.acme.Client")).unwrap();
        let second = ns.resolve(&UnitName::new("com.acme.Client")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.image().as_bytes(), b"client");
        assert!(matches!(first.origin(), UnitOrigin::Archive(loc) if loc.entry == "com/acme/Client.unit"));
    }

    #[test]
    fn test_first_mount_wins() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        let activations = dir.path().join("activations");
        write_archive(&activations, "a.tar", &[("x/Y.unit", b"activation")]);
        write_archive(&plugins, "z.tar", &[("x/Y.unit", b"plugin")]);

        let ns = namespace(&[plugins, activations]);
        let unit = ns.resolve(&UnitName::new("x.Y")).unwrap();
        assert_eq!(unit.image().as_bytes(), b"plugin");
        assert_eq!(ns.resources("x/Y.unit").len(), 2);
    }

    #[test]
    fn test_later_mount_used_when_earlier_lacks_unit() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        let activations = dir.path().join("activations");
        write_archive(&plugins, "a.tar", &[("other/O.unit", b"other")]);
        write_archive(&activations, "b.tar", &[("x/Y.unit", b"activation")]);

        let ns = namespace(&[plugins, activations.clone()]);
        let unit = ns.resolve(&UnitName::new("x.Y")).unwrap();
        assert_eq!(unit.image().as_bytes(), b"activation");
        assert!(matches!(unit.origin(), UnitOrigin::Archive(loc) if loc.archive.starts_with(&activations)));
    }

    #[test]
    fn test_missing_mounts_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ns = namespace(&[dir.path().join("absent")]);
        assert!(ns.archives().is_empty());
        let err = ns.resolve(&UnitName::new("x.Y")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_parent_delegation() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "a.tar", &[("local/L.unit", b"local")]);
        let host: SharedSource =
            Arc::new(MemorySource::new("host").with_unit("host.H", b"host".to_vec()));
        let ns = namespace(&[dir.path().to_path_buf()]).with_parent(host);

        assert_eq!(ns.resolve(&UnitName::new("local.L")).unwrap().image().as_bytes(), b"local");
        let host_unit = ns.resolve(&UnitName::new("host.H")).unwrap();
        assert_eq!(host_unit.origin(), &UnitOrigin::Memory);
        assert!(ns.resolve(&UnitName::new("nowhere.N")).is_err());
    }

    #[test]
    fn test_parent_misses_leave_no_definition_slots() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "a.tar", &[("local/L.unit", b"local")]);
        let host: SharedSource =
            Arc::new(MemorySource::new("host").with_unit("host.H", b"host".to_vec()));
        let ns = namespace(&[dir.path().to_path_buf()]).with_parent(host);

        for i in 0..1_000 {
            assert!(ns.resolve(&UnitName::new(format!("host.Missing{i}"))).is_err());
        }
        for _ in 0..10 {
            ns.resolve(&UnitName::new("host.H")).unwrap();
        }
        assert!(ns.definitions.lock().is_empty());

        ns.resolve(&UnitName::new("local.L")).unwrap();
        assert_eq!(ns.definitions.lock().len(), 1);
    }

    #[test]
    fn test_resources_append_parent_results() {
        let dir = tempfile::tempdir().unwrap();
        let outer = dir.path().join("outer");
        let inner = dir.path().join("inner");
        write_archive(&outer, "o.tar", &[("skein-plugin.def", b"outer")]);
        write_archive(&inner, "i.tar", &[("skein-plugin.def", b"inner")]);

        let parent: SharedSource = Arc::new(namespace(&[outer.clone()]));
        let ns = namespace(&[inner.clone()]).with_parent(parent);

        let found = ns.resources("skein-plugin.def");
        assert_eq!(found.len(), 2);
        assert!(found[0].archive.starts_with(&inner));
        assert!(found[1].archive.starts_with(&outer));
        assert_eq!(ns.read_resource(&found[1]).unwrap(), b"outer");
        assert_eq!(ns.resource("skein-plugin.def"), Some(found[0].clone()));
        assert_eq!(ns.resource("absent"), None);
    }

    #[test]
    fn test_concurrent_first_use_scans_and_defines_once() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            dir.path(),
            "a.tar",
            &[("m/Marked.unit", b"@config-root=plugin.marked\nbody")],
        );
        let config = Arc::new(CountingConfig::default());
        let ns = Arc::new(
            namespace(&[dir.path().to_path_buf()]).with_config_initializer(config.clone()),
        );

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ns = Arc::clone(&ns);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ns.resolve(&UnitName::new("m.Marked")).unwrap()
                })
            })
            .collect();
        let units: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(ns.scans(), 1);
        assert!(units.iter().all(|u| Arc::ptr_eq(u, &units[0])));
        assert_eq!(units[0].config_root(), Some("plugin.marked"));
        assert_eq!(*config.roots.lock(), ["plugin.marked"]);
    }

    #[test]
    fn test_concurrent_distinct_identities_scan_once() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "a.tar", &[("a/A.unit", b"alpha"), ("b/B.unit", b"beta")]);
        let ns = Arc::new(namespace(&[dir.path().to_path_buf()]));
        assert_eq!(ns.scans(), 0);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [("a.A", b"alpha".as_slice()), ("b.B", b"beta".as_slice())]
            .into_iter()
            .map(|(name, expected)| {
                let ns = Arc::clone(&ns);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let unit = ns.resolve(&UnitName::new(name)).unwrap();
                    assert_eq!(unit.image().as_bytes(), expected);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ns.scans(), 1);
        assert_eq!(ns.definitions.lock().len(), 2);
    }

    struct Everything;

    impl PluginDefine for Everything {
        fn selector(&self) -> UnitMatch {
            UnitMatch::predicate(|_| true)
        }
    }

    struct Probe {
        context: String,
    }

    impl Interceptor for Probe {
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn everything(ctx: &ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError> {
        assert!(ctx.unit.is_some());
        Ok(Arc::new(Everything))
    }

    fn probe(ctx: &ConstructContext<'_>) -> Result<Arc<dyn Interceptor>, BoxError> {
        let context = ctx.source.map(|s| s.context_id().to_string()).unwrap_or_default();
        Ok(Arc::new(Probe { context }))
    }

    #[test]
    fn test_instantiate_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            dir.path(),
            "a.tar",
            &[("p/Define.unit", b"define"), ("p/Probe.unit", b"probe")],
        );
        let registry = FactoryRegistry::new()
            .with_define("p.Define", everything)
            .with_interceptor("p.Probe", probe);
        let ns = IsolatedNamespace::new("plugins", [dir.path().to_path_buf()], Arc::new(registry));

        assert!(ns.instantiate_define("p.Define").is_ok());
        let probe = ns.instantiate_interceptor("p.Probe").unwrap();
        let probe = probe.as_any().downcast::<Probe>().unwrap();
        assert_eq!(probe.context, "plugins");

        assert!(ns.instantiate_define("p.Missing").is_err());
        assert!(ns.instantiate_define("not a name").is_err());
    }

    #[test]
    fn test_bridge_shares_mounts_with_new_parent() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "a.tar", &[("p/P.unit", b"p")]);
        let ns = namespace(&[dir.path().to_path_buf()]);
        let host: SharedSource =
            Arc::new(MemorySource::new("host").with_unit("h.H", b"h".to_vec()));

        let bridge = ns.bridge("plugins@host", host);
        assert_eq!(bridge.context_id().as_str(), "plugins@host");
        assert!(bridge.resolve(&UnitName::new("p.P")).is_ok());
        assert!(bridge.resolve(&UnitName::new("h.H")).is_ok());
        assert!(ns.resolve(&UnitName::new("h.H")).is_err());
    }
}
