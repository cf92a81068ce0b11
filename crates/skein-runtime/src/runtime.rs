//! The agent context object.
//!
//! [`SkeinAgent`] owns everything an attached agent needs: the factory
//! registry, the default plugin namespace, the interceptor cache, the
//! transformation pipeline and the boot service manager.  Nothing is global;
//! the host keeps the agent alive for as long as it wants enhancement.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use skein_runtime::SkeinAgent;
//!
//! let agent = SkeinAgent::builder(Arc::new(HostRewriter))
//!     .home("/opt/skein")
//!     .build()?;
//! agent.boot().await?;
//!
//! // From the host's class-load hook:
//! match agent.transform(&name, &image, Some(&context))? {
//!     TransformOutcome::Enhanced(image) => link(image),
//!     TransformOutcome::Unmodified => link_original(),
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use skein_core::{FactoryRegistry, SharedSource, UnitImage, UnitName};
use skein_framework::{
    IgnoreRules, InterceptorCache, PluginBootstrap, PluginFinder, RegistryDiscovery, Rewriter,
    ServiceManager, TransformOutcome, TransformResult, Transformer,
};
use skein_loader::IsolatedNamespace;
use tokio::signal;
use tracing::{Instrument, debug_span, info, info_span, warn};

use crate::config::{ConfigLoader, SkeinConfig, validate_config};
use crate::error::{AgentError, AgentResult};
use crate::logging;
use crate::plugin_config::PluginConfigStore;

/// Context id of the namespace over the plugin mounts.
pub const DEFAULT_NAMESPACE: &str = "skein-plugins";

/// An attached agent.
pub struct SkeinAgent {
    config: SkeinConfig,
    registry: Arc<FactoryRegistry>,
    namespace: Arc<IsolatedNamespace>,
    plugin_config: Arc<PluginConfigStore>,
    transformer: Transformer,
    services: ServiceManager,
}

impl SkeinAgent {
    /// Creates an agent builder; `rewriter` is the host's weaving mechanism.
    pub fn builder(rewriter: Arc<dyn Rewriter>) -> AgentBuilder {
        AgentBuilder::new(rewriter)
    }

    /// Attaches with the factories linked into the binary.
    pub fn attach(config: &SkeinConfig, rewriter: Arc<dyn Rewriter>) -> AgentResult<Self> {
        Self::attach_with(config, FactoryRegistry::linked(), rewriter)
    }

    /// Attaches with an explicit factory registry.
    ///
    /// Validates `config`, initializes logging, then discovers the plugins
    /// under the configured mounts.  Plugin and service failures only shrink
    /// what gets loaded.
    pub fn attach_with(
        config: &SkeinConfig,
        registry: FactoryRegistry,
        rewriter: Arc<dyn Rewriter>,
    ) -> AgentResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        if !config.agent.enabled {
            warn!("Agent disabled by configuration, not attaching");
            return Err(AgentError::Disabled);
        }

        let registry = Arc::new(registry);
        let plugin_config = Arc::new(PluginConfigStore::new(config.plugin.config.clone()));
        let mounts = config.mount_paths();
        let namespace = Arc::new(
            IsolatedNamespace::new(DEFAULT_NAMESPACE, mounts.clone(), Arc::clone(&registry))
                .with_config_initializer(Arc::clone(&plugin_config) as _),
        );

        let plugins = PluginBootstrap::new(Arc::clone(&namespace))
            .with_manifest(&config.plugin.manifest)
            .with_declarations(&config.plugin.declarations)
            .exclude(config.plugin.exclude.iter().cloned())
            .load();
        let plugin_count = plugins.len();

        let cache = Arc::new(InterceptorCache::new(Arc::clone(&namespace)));
        let transformer = Transformer::new(PluginFinder::new(plugins), cache, rewriter)
            .with_ignore_rules(IgnoreRules::new(config.agent.ignore_prefixes.iter().cloned()))
            .with_dump_dir(config.agent.dump_enhanced_dir.clone());
        let services = ServiceManager::new(RegistryDiscovery::new(Arc::clone(&registry)));

        info!(
            mounts = ?mounts,
            plugins = plugin_count,
            services = registry.services().len(),
            "Agent attached"
        );

        Ok(Self {
            config: config.clone(),
            registry,
            namespace,
            plugin_config,
            transformer,
            services,
        })
    }

    pub fn config(&self) -> &SkeinConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// The namespace over the plugin mounts.
    pub fn namespace(&self) -> &Arc<IsolatedNamespace> {
        &self.namespace
    }

    pub fn plugin_config(&self) -> &Arc<PluginConfigStore> {
        &self.plugin_config
    }

    pub fn interceptor_cache(&self) -> &Arc<InterceptorCache> {
        self.transformer.cache()
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    pub fn services(&self) -> &ServiceManager {
        &self.services
    }

    /// Transforms a unit the host is about to link.
    ///
    /// `target` is the host context loading the unit.
    pub fn transform(
        &self,
        unit: &UnitName,
        image: &UnitImage,
        target: Option<&SharedSource>,
    ) -> TransformResult<TransformOutcome> {
        let _span = debug_span!("transform", unit = %unit).entered();
        self.transformer.transform(unit, image, target)
    }

    /// Boots the registered services.
    pub async fn boot(&self) -> AgentResult<()> {
        self.services
            .boot()
            .instrument(info_span!("boot"))
            .await?;
        info!("Agent booted");
        Ok(())
    }

    /// Shuts the services down in reverse boot order.
    pub async fn shutdown(&self) {
        self.services
            .shutdown()
            .instrument(info_span!("shutdown"))
            .await;
        info!("Agent shut down");
    }

    /// Boots, then waits for Ctrl+C or SIGTERM before shutting down.
    pub async fn run(&self) -> AgentResult<()> {
        self.boot().await?;
        info!("Skein agent is running. Press Ctrl+C to stop.");

        let signalled = wait_for_shutdown().await;
        self.shutdown().await;
        signalled
    }

    /// Boots, waits for `shutdown`, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F) -> AgentResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.boot().await?;
        shutdown.await;
        self.shutdown().await;
        Ok(())
    }
}

async fn wait_for_shutdown() -> AgentResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(AgentError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(AgentError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(AgentError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// AgentBuilder
// =============================================================================

/// Builder loading configuration before attaching.
pub struct AgentBuilder {
    config_loader: ConfigLoader,
    registry: Option<FactoryRegistry>,
    rewriter: Arc<dyn Rewriter>,
}

impl AgentBuilder {
    pub fn new(rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            registry: None,
            rewriter,
        }
    }

    /// Sets the agent home, which holds `skein.toml` and the mounts.
    pub fn home<P: AsRef<Path>>(mut self, home: P) -> Self {
        self.config_loader = self.config_loader.home(home);
        self
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: SkeinConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `registry` instead of the factories linked into the binary.
    pub fn registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> AgentResult<SkeinAgent> {
        let config = self.config_loader.load()?;
        let registry = self.registry.unwrap_or_else(FactoryRegistry::linked);
        SkeinAgent::attach_with(&config, registry, self.rewriter)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use skein_core::{
        BootService, BoxError, ConstructContext, EnhancementDescriptor, Interceptor, MemberMatch,
        MemorySource, PluginDefine, RegistrationKind, SharedInterceptor, SharedService, UnitMatch,
    };

    use super::*;

    // ─── Fixtures ───────────────────────────────────────────────

    /// Appends `|<interceptor>@<context>` to the image.
    struct TagRewriter;

    impl Rewriter for TagRewriter {
        fn rewrite(
            &self,
            image: &UnitImage,
            enhancement: &EnhancementDescriptor,
            interceptor: &SharedInterceptor,
        ) -> Result<Option<UnitImage>, BoxError> {
            let tracer = Arc::clone(interceptor)
                .as_any()
                .downcast::<Tracer>()
                .map_err(|_| "unexpected interceptor type")?;
            let mut bytes = image.as_bytes().to_vec();
            bytes.extend_from_slice(format!("|{}@{}", enhancement.interceptor, tracer.context).as_bytes());
            Ok(Some(UnitImage::new(bytes)))
        }
    }

    struct Tracer {
        context: String,
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
        }))
    }

    struct ClientDefine;

    impl PluginDefine for ClientDefine {
        fn selector(&self) -> UnitMatch {
            UnitMatch::named("com.acme.Client")
        }

        fn enhancements(&self) -> Vec<EnhancementDescriptor> {
            vec![EnhancementDescriptor::instance_method(MemberMatch::Any, "i.Tracer")]
        }
    }

    fn client_define(_: &ConstructContext<'_>) -> Result<Arc<dyn PluginDefine>, BoxError> {
        Ok(Arc::new(ClientDefine))
    }

    static BOOTED: AtomicUsize = AtomicUsize::new(0);
    static STOPPED: AtomicUsize = AtomicUsize::new(0);

    struct Reporter;

    #[async_trait]
    impl BootService for Reporter {
        async fn start(&self) -> Result<(), BoxError> {
            BOOTED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), BoxError> {
            STOPPED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn reporter(_: &ConstructContext<'_>) -> Result<SharedService, BoxError> {
        Ok(Arc::new(Reporter))
    }

    fn registry() -> FactoryRegistry {
        FactoryRegistry::new()
            .with_define("p.ClientDefine", client_define)
            .with_interceptor("i.Tracer", tracer)
            .with_service("reporter", RegistrationKind::Plain, reporter)
    }

    fn write_archive(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) {
        std::fs::create_dir_all(dir).unwrap();
        let mut builder = tar::Builder::new(File::create(dir.join(file_name)).unwrap());
        for (name, bytes) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, *bytes).unwrap();
        }
        builder.finish().unwrap();
    }

    fn home() -> tempfile::TempDir {
        let home = tempfile::tempdir().unwrap();
        write_archive(
            &home.path().join("plugins"),
            "acme-client.tar",
            &[
                ("p/ClientDefine.unit", b"@config-root=acme.client\ndefine"),
                ("i/Tracer.unit", b"interceptor"),
                ("skein-plugin.def", b"acme-client=p.ClientDefine\n"),
            ],
        );
        home
    }

    fn agent(home: &Path) -> SkeinAgent {
        SkeinAgent::builder(Arc::new(TagRewriter))
            .home(home)
            .without_env()
            .registry(registry())
            .build()
            .unwrap()
    }

    // ─── Tests ──────────────────────────────────────────────────

    #[test]
    fn test_attach_discovers_plugins() {
        let home = home();
        let agent = agent(home.path());

        assert_eq!(agent.transformer().finder().len(), 1);
        assert_eq!(agent.namespace().id().as_str(), DEFAULT_NAMESPACE);
        assert_eq!(agent.namespace().mounts()[0], home.path().join("plugins"));
        assert!(agent.plugin_config().is_initialized("acme.client"));
    }

    #[test]
    fn test_transform_through_bridging_namespace() {
        let home = home();
        let agent = agent(home.path());
        let host: SharedSource = Arc::new(MemorySource::new("app"));
        let client = UnitName::new("com.acme.Client");

        let outcome = agent
            .transform(&client, &UnitImage::new(b"client".to_vec()), Some(&host))
            .unwrap();
        assert_eq!(
            outcome.into_image().unwrap().as_bytes(),
            format!("client|i.Tracer@{DEFAULT_NAMESPACE}@app").as_bytes()
        );
        assert_eq!(agent.interceptor_cache().bridges(), 1);

        let other = agent
            .transform(&UnitName::new("com.acme.Other"), &UnitImage::new(b"other".to_vec()), Some(&host))
            .unwrap();
        assert_eq!(other, TransformOutcome::Unmodified);
    }

    #[test]
    fn test_excluded_and_ignored_units() {
        let home = home();
        std::fs::write(
            home.path().join("skein.toml"),
            "[agent]\nignore_prefixes = [\"com.acme.\"]\n",
        )
        .unwrap();
        let agent = agent(home.path());
        let outcome = agent
            .transform(&UnitName::new("com.acme.Client"), &UnitImage::new(b"client".to_vec()), None)
            .unwrap();
        assert_eq!(outcome, TransformOutcome::Unmodified);

        let mut config = SkeinConfig::default();
        config.plugin.exclude = vec!["acme-client".into()];
        let agent = SkeinAgent::builder(Arc::new(TagRewriter))
            .merge(config)
            .home(home.path())
            .without_env()
            .registry(registry())
            .build()
            .unwrap();
        assert!(agent.transformer().finder().is_empty());
    }

    #[test]
    fn test_dump_enhanced_units() {
        let home = home();
        let dump = home.path().join("dump");
        let mut config = SkeinConfig::default();
        config.agent.dump_enhanced_dir = Some(dump.clone());
        config.agent.home = Some(home.path().to_path_buf());

        let agent = SkeinAgent::attach_with(&config, registry(), Arc::new(TagRewriter)).unwrap();
        agent
            .transform(&UnitName::new("com.acme.Client"), &UnitImage::new(b"c".to_vec()), None)
            .unwrap();
        let dumped = std::fs::read(dump.join("com/acme/Client.unit")).unwrap();
        assert_eq!(dumped, format!("c|i.Tracer@{DEFAULT_NAMESPACE}").as_bytes());
    }

    #[test]
    fn test_disabled_agent_does_not_attach() {
        let mut config = SkeinConfig::default();
        config.agent.enabled = false;
        let result = SkeinAgent::attach_with(&config, registry(), Arc::new(TagRewriter));
        assert!(matches!(result, Err(AgentError::Disabled)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SkeinConfig::default();
        config.plugin.mount.clear();
        let result = SkeinAgent::attach_with(&config, registry(), Arc::new(TagRewriter));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_until_boots_and_shuts_down() {
        let home = home();
        let agent = agent(home.path());

        agent
            .run_until(async {
                assert_eq!(BOOTED.load(Ordering::SeqCst), 1);
            })
            .await
            .unwrap();

        assert_eq!(STOPPED.load(Ordering::SeqCst), 1);
        assert!(agent.services().find::<Reporter>().is_some());
        assert!(matches!(agent.boot().await, Err(AgentError::Lifecycle(_))));
    }
}
