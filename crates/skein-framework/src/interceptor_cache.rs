//! Per-context singleton cache of interceptor instances.
//!
//! # Overview
//!
//! An interceptor must see the symbols of the context whose unit it
//! enhances, yet its own code lives in the plugin archives.  For each target
//! context the cache builds one bridging [`IsolatedNamespace`] over the
//! default namespace's mounts, with the target as parent, and constructs the
//! interceptor there.
//!
//! # Locking
//!
//! ```text
//! load(id, target)
//!   ├─ snapshot hit?                     lock-free (ArcSwap)
//!   └─ cold path
//!        ├─ coarse lock: bridge + per-key slot, then release
//!        ├─ slot lock: re-check snapshot, construct once
//!        └─ publish into a new snapshot (rcu)
//! ```
//!
//! Instances are never evicted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use skein_core::{CodeSource, ContextId, SharedInterceptor, SharedSource};
use skein_loader::IsolatedNamespace;
use tracing::{debug, info};

use crate::error::{LoadError, LoadResult};

/// Cache key: (interceptor identity, target context).
type CacheKey = (String, ContextId);

#[derive(Default)]
struct ColdState {
    bridges: HashMap<ContextId, Arc<IsolatedNamespace>>,
    slots: HashMap<CacheKey, Arc<Mutex<()>>>,
}

/// Hands out one interceptor instance per (identity, target context).
pub struct InterceptorCache {
    default: Arc<IsolatedNamespace>,
    instances: ArcSwap<HashMap<CacheKey, SharedInterceptor>>,
    cold: Mutex<ColdState>,
}

impl InterceptorCache {
    pub fn new(default: Arc<IsolatedNamespace>) -> Self {
        Self {
            default,
            instances: ArcSwap::from_pointee(HashMap::new()),
            cold: Mutex::new(ColdState::default()),
        }
    }

    /// The namespace used when no target context is given.
    pub fn default_namespace(&self) -> &Arc<IsolatedNamespace> {
        &self.default
    }

    /// Returns the instance of `interceptor` for `target`, constructing it on
    /// first request.
    ///
    /// `None` targets the default namespace.  Failures are not cached.
    pub fn load(&self, interceptor: &str, target: Option<&SharedSource>) -> LoadResult<SharedInterceptor> {
        let target = target.filter(|t| t.context_id() != self.default.id());
        let context = match target {
            Some(t) => t.context_id().clone(),
            None => self.default.id().clone(),
        };
        let key: CacheKey = (interceptor.to_string(), context);

        if let Some(instance) = self.instances.load().get(&key) {
            return Ok(Arc::clone(instance));
        }

        let (namespace, slot) = {
            let mut cold = self.cold.lock();
            let namespace = match target {
                Some(t) => self.bridge_for(&mut cold, t),
                None => Arc::clone(&self.default),
            };
            let slot = Arc::clone(cold.slots.entry(key.clone()).or_default());
            (namespace, slot)
        };

        let _constructing = slot.lock();
        if let Some(instance) = self.instances.load().get(&key) {
            return Ok(Arc::clone(instance));
        }

        let instance = namespace
            .instantiate_interceptor(interceptor)
            .map_err(|source| LoadError {
                interceptor: interceptor.to_string(),
                context: key.1.clone(),
                source,
            })?;

        self.instances.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), Arc::clone(&instance));
            next
        });
        self.cold.lock().slots.remove(&key);

        debug!(interceptor = %key.0, context = %key.1, "Interceptor instance cached");
        Ok(instance)
    }

    fn bridge_for(&self, cold: &mut ColdState, target: &SharedSource) -> Arc<IsolatedNamespace> {
        let context = target.context_id();
        if let Some(bridge) = cold.bridges.get(context) {
            return Arc::clone(bridge);
        }
        let bridge = Arc::new(
            self.default
                .bridge(format!("{}@{}", self.default.id(), context), Arc::clone(target)),
        );
        info!(context = %context, bridge = %bridge.id(), "Bridging namespace created");
        cold.bridges.insert(context.clone(), Arc::clone(&bridge));
        bridge
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.instances.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.load().is_empty()
    }

    /// Number of bridging namespaces created so far.
    pub fn bridges(&self) -> usize {
        self.cold.lock().bridges.len()
    }
}

impl fmt::Debug for InterceptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorCache")
            .field("default", &self.default.id())
            .field("instances", &self.len())
            .field("bridges", &self.bridges())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::fs::File;
    use std::path::Path;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    use skein_core::{
        BoxError, ConstructContext, FactoryRegistry, Interceptor, MemorySource, UnitName,
    };

    use super::*;

    struct Tracer {
        context: String,
        host_visible: bool,
    }

    impl Interceptor for Tracer {
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn tracer(ctx: &ConstructContext<'_>) -> Result<SharedInterceptor, BoxError> {
        let source = ctx.source.ok_or("constructed without a namespace")?;
        Ok(Arc::new(Tracer {
            context: source.context_id().to_string(),
            host_visible: source.resolve(&UnitName::new("host.Api")).is_ok(),
        }))
    }

    static RACE_CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

    fn counted(ctx: &ConstructContext<'_>) -> Result<SharedInterceptor, BoxError> {
        RACE_CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        tracer(ctx)
    }

    static FLAKY_READY: AtomicBool = AtomicBool::new(false);

    fn flaky(ctx: &ConstructContext<'_>) -> Result<SharedInterceptor, BoxError> {
        if !FLAKY_READY.load(Ordering::SeqCst) {
            return Err("backend not ready".into());
        }
        tracer(ctx)
    }

    fn cache(mount: &Path) -> InterceptorCache {
        std::fs::create_dir_all(mount).unwrap();
        let mut builder = tar::Builder::new(File::create(mount.join("interceptors.tar")).unwrap());
        for name in ["i/Tracer.unit", "i/Counted.unit", "i/Flaky.unit"] {
            let mut header = tar::Header::new_gnu();
            header.set_size(1);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, &b"x"[..]).unwrap();
        }
        builder.finish().unwrap();

        let registry = FactoryRegistry::new()
            .with_interceptor("i.Tracer", tracer)
            .with_interceptor("i.Counted", counted)
            .with_interceptor("i.Flaky", flaky);
        InterceptorCache::new(Arc::new(IsolatedNamespace::new(
            "plugins",
            [mount.to_path_buf()],
            Arc::new(registry),
        )))
    }

    fn host(id: &str) -> SharedSource {
        Arc::new(MemorySource::new(id).with_unit("host.Api", b"api".to_vec()))
    }

    fn tracer_of(instance: SharedInterceptor) -> Arc<Tracer> {
        instance.as_any().downcast::<Tracer>().ok().unwrap()
    }

    #[test]
    fn test_same_key_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let a = host("app-a");

        let first = cache.load("i.Tracer", Some(&a)).unwrap();
        let second = cache.load("i.Tracer", Some(&a)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let tracer = tracer_of(first);
        assert_eq!(tracer.context, "plugins@app-a");
        assert!(tracer.host_visible);
    }

    #[test]
    fn test_distinct_contexts_get_distinct_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let a = cache.load("i.Tracer", Some(&host("app-a"))).unwrap();
        let b = cache.load("i.Tracer", Some(&host("app-b"))).unwrap();
        let default = cache.load("i.Tracer", None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &default));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.bridges(), 2);

        let default = tracer_of(default);
        assert_eq!(default.context, "plugins");
        assert!(!default.host_visible);
    }

    #[test]
    fn test_default_target_shares_the_none_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let default: SharedSource = cache.default_namespace().clone();

        let implicit = cache.load("i.Tracer", None).unwrap();
        let explicit = cache.load("i.Tracer", Some(&default)).unwrap();
        assert!(Arc::ptr_eq(&implicit, &explicit));
        assert_eq!(cache.bridges(), 0);
    }

    #[test]
    fn test_concurrent_loads_construct_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache(dir.path()));
        let target = host("app-race");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                let target = Arc::clone(&target);
                thread::spawn(move || {
                    barrier.wait();
                    cache.load("i.Counted", Some(&target)).unwrap()
                })
            })
            .collect();
        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(RACE_CONSTRUCTIONS.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let err = cache.load("i.Flaky", None).err().unwrap();
        assert_eq!(err.interceptor, "i.Flaky");
        assert_eq!(err.context.as_str(), "plugins");
        assert!(cache.is_empty());

        FLAKY_READY.store(true, Ordering::SeqCst);
        assert!(cache.load("i.Flaky", None).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unknown_interceptor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        assert!(cache.load("i.Unknown", None).is_err());
    }
}
