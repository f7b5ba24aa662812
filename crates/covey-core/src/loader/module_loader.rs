//! Dynamic module loader
//!
//! Discovers loadable agent modules in a directory, tracks their
//! change state via content digests, binds their declared agent class
//! against the behavior catalog, and instantiates lifecycle engines
//! from them. Reload never touches running agent instances: migrating
//! live state across incompatible code changes cannot be done safely
//! in general, so reload only affects subsequently created agents.

use crate::agent::{AgentEngine, AgentRegistry};
use crate::error::{ConfigError, Error, LoadError, RegistryError, Result};
use crate::loader::catalog::BehaviorCatalog;
use crate::loader::scanner::ModuleScanner;
use crate::types::{
    AgentConfig, AgentStatus, LoaderStats, ModuleChange, ModuleDescriptor, ModuleLoadStatus,
    ModuleManifest,
};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, Debouncer};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Scans, loads and instantiates pluggable agent modules
pub struct ModuleLoader {
    scanner: ModuleScanner,
    catalog: BehaviorCatalog,
    registry: Arc<AgentRegistry>,
    modules: Mutex<HashMap<String, ModuleDescriptor>>,
    auto_scan: Mutex<Option<tokio::task::JoinHandle<()>>>,
    watcher: Mutex<Option<Debouncer<RecommendedWatcher>>>,
}

impl ModuleLoader {
    pub fn new(
        module_root: impl Into<PathBuf>,
        catalog: BehaviorCatalog,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            scanner: ModuleScanner::new(module_root),
            catalog,
            registry,
            modules: Mutex::new(HashMap::new()),
            auto_scan: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    /// Default module root under the platform data directory
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("covey")
            .join("modules")
    }

    pub fn catalog(&self) -> &BehaviorCatalog {
        &self.catalog
    }

    /// Scan the module root and classify every loadable unit as
    /// NEW, UNCHANGED, MODIFIED or REMOVED relative to the last scan.
    ///
    /// Idempotent when nothing on disk changed. A MODIFIED module is
    /// downgraded to DISCOVERED so its stale class can never be
    /// instantiated without an explicit reload.
    pub async fn scan_modules(&self) -> Result<BTreeMap<String, ModuleChange>> {
        let files = self.scanner.snapshot().await?;

        let mut modules = self.modules.lock();
        let mut report = BTreeMap::new();

        let known: Vec<String> = modules.keys().cloned().collect();
        for name in known {
            if !files.contains_key(&name) {
                modules.remove(&name);
                debug!("Module removed from disk: {}", name);
                report.insert(name, ModuleChange::Removed);
            }
        }

        for (name, file) in files {
            match modules.get_mut(&name) {
                None => {
                    debug!("New module discovered: {} at {:?}", name, file.path);
                    modules.insert(
                        name.clone(),
                        ModuleDescriptor::discovered(&name, &file.path, &file.digest),
                    );
                    report.insert(name, ModuleChange::New);
                }
                Some(descriptor) if descriptor.content_digest == file.digest => {
                    report.insert(name, ModuleChange::Unchanged);
                }
                Some(descriptor) => {
                    debug!("Module changed on disk: {}", name);
                    descriptor.content_digest = file.digest;
                    descriptor.module_path = file.path;
                    descriptor.load_status = ModuleLoadStatus::Discovered;
                    report.insert(name, ModuleChange::Modified);
                }
            }
        }

        let changed = report
            .values()
            .filter(|c| **c != ModuleChange::Unchanged)
            .count();
        if changed > 0 {
            info!("Module scan: {} change(s) across {} module(s)", changed, report.len());
        }
        Ok(report)
    }

    /// Load (or re-load) a scanned module: parse its manifest and bind
    /// the declared agent class against the catalog.
    ///
    /// Returns false on any failure, recording FAILED plus a message
    /// on the descriptor; a class bound by an earlier successful load
    /// is left untouched. Never raises across this boundary.
    pub async fn load_module(&self, name: &str) -> bool {
        let path = match self.modules.lock().get(name) {
            Some(descriptor) => descriptor.module_path.clone(),
            None => {
                warn!("Cannot load unknown module: {} (scan first)", name);
                return false;
            }
        };

        let outcome = self.read_manifest(name, &path).await;

        let mut modules = self.modules.lock();
        let Some(descriptor) = modules.get_mut(name) else {
            // Removed by a concurrent scan while we were reading
            warn!("Module {} disappeared during load", name);
            return false;
        };

        match outcome {
            Ok((manifest, digest)) => {
                descriptor.content_digest = digest;
                descriptor.agent_class_name = Some(manifest.agent_class.clone());
                descriptor.load_status = ModuleLoadStatus::Loaded;
                descriptor.error_message = None;
                descriptor.last_loaded_at = Some(chrono::Utc::now());
                info!("Loaded module {} (agent class: {})", name, manifest.agent_class);
                true
            }
            Err(reason) => {
                descriptor.load_status = ModuleLoadStatus::Failed;
                descriptor.error_message = Some(reason.clone());
                warn!("Failed to load module {}: {}", name, reason);
                false
            }
        }
    }

    /// Read and validate a manifest, returning it with the digest of
    /// the bytes that were actually parsed.
    async fn read_manifest(
        &self,
        name: &str,
        path: &std::path::Path,
    ) -> std::result::Result<(ModuleManifest, String), String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

        let manifest = ModuleManifest::from_json_str(&contents)?;

        if !self.catalog.contains(&manifest.agent_class) {
            return Err(format!(
                "agent class {} is not registered; module {} does not satisfy the agent contract",
                manifest.agent_class, name
            ));
        }

        Ok((manifest, ModuleScanner::digest_bytes(contents.as_bytes())))
    }

    /// Unload then load one module.
    ///
    /// Both table updates happen in single critical sections, so
    /// concurrent readers only ever see the old binding, "unloaded",
    /// or the new binding; never a half-updated descriptor. Agents
    /// already created from the old binding keep running untouched.
    pub async fn reload_module(&self, name: &str) -> bool {
        {
            let mut modules = self.modules.lock();
            let Some(descriptor) = modules.get_mut(name) else {
                warn!("Cannot reload unknown module: {}", name);
                return false;
            };
            descriptor.agent_class_name = None;
            descriptor.load_status = ModuleLoadStatus::Discovered;
            descriptor.error_message = None;
            descriptor.last_loaded_at = None;
        }
        info!("Reloading module: {}", name);
        self.load_module(name).await
    }

    /// Load every module currently in DISCOVERED state; returns how
    /// many loaded successfully.
    pub async fn load_discovered(&self) -> usize {
        let discovered: Vec<String> = {
            let modules = self.modules.lock();
            modules
                .values()
                .filter(|d| d.load_status == ModuleLoadStatus::Discovered)
                .map(|d| d.module_name.clone())
                .collect()
        };

        let mut loaded = 0;
        for name in discovered {
            if self.load_module(&name).await {
                loaded += 1;
            }
        }
        loaded
    }

    /// Instantiate a new agent from a loaded module.
    ///
    /// Requires the module to be LOADED with an on-disk digest still
    /// matching the loaded one, and `agent_id` to be free in the
    /// registry. Fails without side effects otherwise. The new engine
    /// is registered but not started; the caller decides, typically
    /// honoring `config.auto_start`.
    pub async fn create_agent(
        &self,
        module_name: &str,
        agent_id: &str,
        mut config: AgentConfig,
    ) -> Result<Arc<AgentEngine>> {
        if config.agent_id.is_empty() {
            config.agent_id = agent_id.to_string();
        } else if config.agent_id != agent_id {
            return Err(ConfigError::InvalidValue {
                field: "agent_id".to_string(),
                reason: format!(
                    "config carries id {} but {} was requested",
                    config.agent_id, agent_id
                ),
            }
            .into());
        }
        config.validate().map_err(Error::Config)?;

        let (path, loaded_digest, class_name) = {
            let modules = self.modules.lock();
            let descriptor = modules
                .get(module_name)
                .ok_or_else(|| LoadError::ModuleNotFound(module_name.to_string()))?;
            if !descriptor.is_loaded() {
                return Err(LoadError::NotLoaded(module_name.to_string()).into());
            }
            let class_name = descriptor.agent_class_name.clone().ok_or_else(|| {
                Error::Internal(format!("loaded module {} has no bound class", module_name))
            })?;
            (
                descriptor.module_path.clone(),
                descriptor.content_digest.clone(),
                class_name,
            )
        };

        // Recompute the digest before reuse: a module edited since its
        // load must be explicitly reloaded before new instances exist.
        let current_digest = ModuleScanner::digest_file(&path).await?;
        if current_digest != loaded_digest {
            if let Some(descriptor) = self.modules.lock().get_mut(module_name) {
                descriptor.load_status = ModuleLoadStatus::Discovered;
            }
            return Err(LoadError::StaleDigest {
                module: module_name.to_string(),
            }
            .into());
        }

        if self.registry.contains(agent_id) {
            return Err(RegistryError::AlreadyRegistered(agent_id.to_string()).into());
        }

        let factory = self.catalog.resolve(&class_name).ok_or_else(|| {
            LoadError::UnknownAgentClass {
                module: module_name.to_string(),
                class: class_name.clone(),
            }
        })?;

        let behavior = factory(&config);
        let engine = Arc::new(AgentEngine::new(
            config,
            behavior,
            Arc::clone(&self.registry),
        ));
        self.registry.register_agent(&engine)?;
        info!(
            "Created agent {} from module {} (class {})",
            agent_id, module_name, class_name
        );
        Ok(engine)
    }

    /// Copy of one module's descriptor
    pub fn get_module(&self, name: &str) -> Option<ModuleDescriptor> {
        self.modules.lock().get(name).cloned()
    }

    /// Copies of all module descriptors, sorted by name
    pub fn list_modules(&self) -> Vec<ModuleDescriptor> {
        let mut descriptors: Vec<ModuleDescriptor> =
            self.modules.lock().values().cloned().collect();
        descriptors.sort_by(|a, b| a.module_name.cmp(&b.module_name));
        descriptors
    }

    /// Module-table counts merged with registry agent counts
    pub fn get_loader_stats(&self) -> LoaderStats {
        let (total, loaded, failed) = {
            let modules = self.modules.lock();
            let loaded = modules
                .values()
                .filter(|d| d.load_status == ModuleLoadStatus::Loaded)
                .count();
            let failed = modules
                .values()
                .filter(|d| d.load_status == ModuleLoadStatus::Failed)
                .count();
            (modules.len(), loaded, failed)
        };
        LoaderStats {
            total_modules: total,
            loaded_modules: loaded,
            failed_modules: failed,
            total_agents: self.registry.len(),
            running_agents: self.registry.count_by_status(AgentStatus::Running),
        }
    }

    /// Start a background task that rescans every `interval` and logs
    /// discovered changes. It never reloads anything: reload is always
    /// an explicit, caller-triggered action, so running-agent state is
    /// never silently dropped.
    pub fn start_auto_scan(self: &Arc<Self>, interval: Duration) {
        let mut guard = self.auto_scan.lock();
        if guard.is_some() {
            debug!("Auto-scan already running");
            return;
        }

        info!("Starting module auto-scan every {:?}", interval);
        let loader: Weak<Self> = Arc::downgrade(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(loader) = loader.upgrade() else {
                    break;
                };
                match loader.scan_modules().await {
                    Ok(report) => {
                        for (name, change) in &report {
                            if *change != ModuleChange::Unchanged {
                                info!("Auto-scan: module {} is {:?}", name, change);
                            }
                        }
                    }
                    Err(e) => warn!("Auto-scan failed: {}", e),
                }
            }
        }));
    }

    /// Stop the auto-scan task, if one is running
    pub fn stop_auto_scan(&self) {
        if let Some(handle) = self.auto_scan.lock().take() {
            handle.abort();
            info!("Stopped module auto-scan");
        }
    }

    /// Attach a debounced filesystem watcher to the module root.
    ///
    /// Event-driven counterpart of auto-scan with the same policy:
    /// changes are scanned and logged, never reloaded. Must be called
    /// from within a tokio runtime.
    pub fn watch_modules(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.watcher.lock();
        if guard.is_some() {
            debug!("Already watching module root");
            return Ok(());
        }

        info!("Watching module root: {:?}", self.scanner.root());

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(500), tx).map_err(|e| {
            Error::Load(LoadError::Watch(format!("Failed to create watcher: {}", e)))
        })?;

        debouncer
            .watcher()
            .watch(self.scanner.root(), RecursiveMode::NonRecursive)
            .map_err(|e| {
                Error::Load(LoadError::Watch(format!(
                    "Failed to watch {:?}: {}",
                    self.scanner.root(),
                    e
                )))
            })?;

        let loader: Weak<Self> = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::current();

        // Bridge the sync watcher events onto the runtime
        std::thread::spawn(move || {
            while let Ok(events) = rx.recv() {
                match events {
                    Ok(_events) => {
                        let Some(loader) = loader.upgrade() else {
                            break;
                        };
                        runtime.spawn(async move {
                            match loader.scan_modules().await {
                                Ok(report) => {
                                    for (name, change) in &report {
                                        if *change != ModuleChange::Unchanged {
                                            info!("Watcher: module {} is {:?}", name, change);
                                        }
                                    }
                                }
                                Err(e) => warn!("Watcher-triggered scan failed: {}", e),
                            }
                        });
                    }
                    Err(e) => {
                        error!("Module watch error: {:?}", e);
                    }
                }
            }
        });

        *guard = Some(debouncer);
        Ok(())
    }

    /// Detach the module root watcher, if attached
    pub fn unwatch_modules(&self) {
        if self.watcher.lock().take().is_some() {
            info!("Stopped watching module root");
        }
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_scan.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentBehavior, AgentContext};
    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};

    struct Echo;

    #[async_trait]
    impl AgentBehavior for Echo {
        async fn initialize(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn run(&mut self, ctx: &mut AgentContext) -> anyhow::Result<()> {
            ctx.cancelled().await;
            Ok(())
        }

        async fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn catalog() -> BehaviorCatalog {
        BehaviorCatalog::new()
            .with_behavior("echo", |_| Box::new(Echo))
            .with_behavior("counter", |_| Box::new(Echo))
    }

    fn loader_in(dir: &TempDir) -> (Arc<ModuleLoader>, Arc<AgentRegistry>) {
        let registry = Arc::new(AgentRegistry::new());
        let loader = Arc::new(ModuleLoader::new(
            dir.path(),
            catalog(),
            Arc::clone(&registry),
        ));
        (loader, registry)
    }

    fn write_module(dir: &TempDir, name: &str, class: &str) {
        std::fs::write(
            dir.path().join(format!("{name}.agent.json")),
            format!(r#"{{"agent_class": "{class}"}}"#),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_scan_classifications() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);

        write_module(&dir, "alpha", "echo");
        write_module(&dir, "beta", "echo");

        let report = loader.scan_modules().await.unwrap();
        assert_eq!(report["alpha"], ModuleChange::New);
        assert_eq!(report["beta"], ModuleChange::New);

        // Nothing changed: idempotent
        let report = loader.scan_modules().await.unwrap();
        assert_eq!(report["alpha"], ModuleChange::Unchanged);
        assert_eq!(report["beta"], ModuleChange::Unchanged);

        let digest_before = loader.get_module("alpha").unwrap().content_digest;
        write_module(&dir, "alpha", "counter");
        std::fs::remove_file(dir.path().join("beta.agent.json")).unwrap();

        let report = loader.scan_modules().await.unwrap();
        assert_eq!(report["alpha"], ModuleChange::Modified);
        assert_eq!(report["beta"], ModuleChange::Removed);
        assert_ne!(
            loader.get_module("alpha").unwrap().content_digest,
            digest_before
        );
        assert!(loader.get_module("beta").is_none());
    }

    #[tokio::test]
    async fn test_load_module_binds_class() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();

        assert!(loader.load_module("worker").await);

        let descriptor = loader.get_module("worker").unwrap();
        assert_eq!(descriptor.load_status, ModuleLoadStatus::Loaded);
        assert_eq!(descriptor.agent_class_name.as_deref(), Some("echo"));
        assert!(descriptor.last_loaded_at.is_some());
        assert!(descriptor.error_message.is_none());
    }

    #[tokio::test]
    async fn test_load_module_unknown_class_fails_cleanly() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "rogue", "not-a-class");
        loader.scan_modules().await.unwrap();

        assert!(!loader.load_module("rogue").await);

        let descriptor = loader.get_module("rogue").unwrap();
        assert_eq!(descriptor.load_status, ModuleLoadStatus::Failed);
        assert!(descriptor.error_message.is_some());
        assert!(descriptor.agent_class_name.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_prior_class_binding() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        assert!(loader.load_module("worker").await);

        // Break the manifest and rescan; load fails but the class
        // bound by the earlier successful load stays recorded.
        std::fs::write(dir.path().join("worker.agent.json"), "{ not json").unwrap();
        loader.scan_modules().await.unwrap();
        assert!(!loader.load_module("worker").await);

        let descriptor = loader.get_module("worker").unwrap();
        assert_eq!(descriptor.load_status, ModuleLoadStatus::Failed);
        assert_eq!(descriptor.agent_class_name.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn test_load_unscanned_module_returns_false() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);
        assert!(!loader.load_module("ghost").await);
    }

    #[tokio::test]
    async fn test_reload_after_modify() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        assert!(loader.load_module("worker").await);

        write_module(&dir, "worker", "counter");
        let report = loader.scan_modules().await.unwrap();
        assert_eq!(report["worker"], ModuleChange::Modified);
        // Modified modules drop back to DISCOVERED until reloaded
        assert_eq!(
            loader.get_module("worker").unwrap().load_status,
            ModuleLoadStatus::Discovered
        );

        assert!(loader.reload_module("worker").await);
        let descriptor = loader.get_module("worker").unwrap();
        assert_eq!(descriptor.load_status, ModuleLoadStatus::Loaded);
        assert_eq!(descriptor.agent_class_name.as_deref(), Some("counter"));
    }

    #[tokio::test]
    async fn test_create_agent_from_loaded_module() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        loader.load_module("worker").await;

        let config = AgentConfig::new("w-1", "Worker One", "worker");
        let engine = loader.create_agent("worker", "w-1", config).await.unwrap();

        assert_eq!(engine.id(), "w-1");
        // Registered but not started
        assert_eq!(
            registry.get_status("w-1").unwrap().status,
            AgentStatus::Created
        );
    }

    #[tokio::test]
    async fn test_create_agent_requires_loaded_module() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        // Deliberately not loaded

        let config = AgentConfig::new("w-1", "Worker One", "worker");
        let err = loader.create_agent("worker", "w-1", config).await.unwrap_err();
        assert!(matches!(err, Error::Load(LoadError::NotLoaded(_))));
        assert!(registry.is_empty());

        let config = AgentConfig::new("w-2", "Worker Two", "worker");
        let err = loader.create_agent("ghost", "w-2", config).await.unwrap_err();
        assert!(matches!(err, Error::Load(LoadError::ModuleNotFound(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_create_agent_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        loader.load_module("worker").await;

        let config = AgentConfig::new("w-1", "Worker", "worker");
        loader.create_agent("worker", "w-1", config).await.unwrap();

        let config = AgentConfig::new("w-1", "Imposter", "worker");
        let err = loader.create_agent("worker", "w-1", config).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Registry(RegistryError::AlreadyRegistered(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_create_agent_refuses_stale_digest() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        loader.load_module("worker").await;

        // Edit the file behind the loader's back; no rescan, no reload
        write_module(&dir, "worker", "counter");

        let config = AgentConfig::new("w-1", "Worker", "worker");
        let err = loader.create_agent("worker", "w-1", config).await.unwrap_err();
        assert!(matches!(err, Error::Load(LoadError::StaleDigest { .. })));
        assert!(registry.is_empty());
        assert_eq!(
            loader.get_module("worker").unwrap().load_status,
            ModuleLoadStatus::Discovered
        );
    }

    #[tokio::test]
    async fn test_create_agent_id_mismatch() {
        let dir = tempdir().unwrap();
        let (loader, registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        loader.scan_modules().await.unwrap();
        loader.load_module("worker").await;

        let config = AgentConfig::new("other-id", "Worker", "worker");
        let err = loader.create_agent("worker", "w-1", config).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_loader_stats() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);
        write_module(&dir, "worker", "echo");
        write_module(&dir, "rogue", "not-a-class");
        loader.scan_modules().await.unwrap();
        assert_eq!(loader.load_discovered().await, 1);

        let config = AgentConfig::new("w-1", "Worker", "worker");
        loader.create_agent("worker", "w-1", config).await.unwrap();

        let stats = loader.get_loader_stats();
        assert_eq!(stats.total_modules, 2);
        assert_eq!(stats.loaded_modules, 1);
        assert_eq!(stats.failed_modules, 1);
        assert_eq!(stats.total_agents, 1);
        assert_eq!(stats.running_agents, 0);
    }

    #[tokio::test]
    async fn test_auto_scan_discovers_new_modules() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);

        loader.start_auto_scan(Duration::from_millis(50));
        write_module(&dir, "late", "echo");

        // Poll until the background scan picks it up
        let mut found = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if loader.get_module("late").is_some() {
                found = true;
                break;
            }
        }
        loader.stop_auto_scan();
        assert!(found, "auto-scan never discovered the new module");

        // Discovery only: auto-scan must not load
        assert_eq!(
            loader.get_module("late").unwrap().load_status,
            ModuleLoadStatus::Discovered
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_modules_smoke() {
        let dir = tempdir().unwrap();
        let (loader, _registry) = loader_in(&dir);

        loader.watch_modules().unwrap();
        // Idempotent
        loader.watch_modules().unwrap();

        write_module(&dir, "watched", "echo");
        tokio::time::sleep(Duration::from_millis(900)).await;

        loader.unwatch_modules();
        // The watcher only scans and logs; load status must not move
        // past DISCOVERED even when the event arrived.
        if let Some(descriptor) = loader.get_module("watched") {
            assert_eq!(descriptor.load_status, ModuleLoadStatus::Discovered);
        }
    }
}
