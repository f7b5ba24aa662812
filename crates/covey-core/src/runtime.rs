//! Runtime composition root
//!
//! Owns the single registry instance and the module loader, and wires
//! them together for hosts: bootstrap (scan → load → create → start),
//! the stale-agent watchdog, and orderly shutdown. Hosts construct one
//! `AgentRuntime` and pass its registry/loader references around
//! instead of reaching for globals.

use crate::agent::{AgentManager, AgentRegistry, DEFAULT_HEALTH_FACTOR};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::loader::{BehaviorCatalog, ModuleLoader};
use crate::types::AgentStatus;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{info, warn};

/// Construction options for an [`AgentRuntime`]
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Directory scanned for `*.agent.json` loadable units
    pub module_root: PathBuf,
    /// Directory holding `<agent_id>.json` config descriptors
    pub config_root: PathBuf,
    /// Multiplier on heartbeat_interval for the health predicate
    pub health_factor: f64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            module_root: ModuleLoader::default_root(),
            config_root: ConfigStore::default_root(),
            health_factor: DEFAULT_HEALTH_FACTOR,
        }
    }
}

/// Process-wide agent runtime
pub struct AgentRuntime {
    registry: Arc<AgentRegistry>,
    loader: Arc<ModuleLoader>,
    configs: ConfigStore,
    watchdog: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AgentRuntime {
    pub fn new(options: RuntimeOptions, catalog: BehaviorCatalog) -> Self {
        let registry = Arc::new(AgentRegistry::with_health_factor(options.health_factor));
        let loader = Arc::new(ModuleLoader::new(
            options.module_root,
            catalog,
            Arc::clone(&registry),
        ));
        Self {
            registry,
            loader,
            configs: ConfigStore::new(options.config_root),
            watchdog: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<ModuleLoader> {
        &self.loader
    }

    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    /// Scan and load all modules, then create one agent per config
    /// descriptor (its `agent_type` names the module) and start the
    /// ones marked `auto_start`.
    ///
    /// Per-agent failures are logged and skipped; the returned manager
    /// holds every agent that was actually created.
    pub async fn bootstrap(&self) -> Result<AgentManager> {
        self.loader.scan_modules().await?;
        let loaded = self.loader.load_discovered().await;
        info!("Bootstrap: {} module(s) loaded", loaded);

        let mut manager = AgentManager::new(Arc::clone(&self.registry));
        for config in self.configs.load_all().await? {
            let module = config.agent_type.clone();
            let agent_id = config.agent_id.clone();
            let auto_start = config.auto_start;

            match self.loader.create_agent(&module, &agent_id, config).await {
                Ok(engine) => {
                    if auto_start {
                        if let Err(e) = engine.start().await {
                            warn!("Auto-start failed for agent {}: {}", agent_id, e);
                        }
                    }
                    manager.adopt(engine);
                }
                Err(e) => {
                    warn!(
                        "Could not create agent {} from module {}: {}",
                        agent_id, module, e
                    );
                }
            }
        }

        info!("Bootstrap complete: {} agent(s) created", manager.agents().len());
        Ok(manager)
    }

    /// Start the supervisory watchdog: every `interval`, RUNNING
    /// agents whose heartbeat is older than
    /// `heartbeat_interval × grace_factor` are force-marked ERROR and
    /// deregistered. Covers execution contexts that died without ever
    /// reaching `stop()`.
    pub fn start_watchdog(&self, interval: Duration, grace_factor: f64) {
        let mut guard = self.watchdog.lock();
        if guard.is_some() {
            return;
        }

        info!(
            "Starting watchdog: every {:?}, grace factor {}",
            interval, grace_factor
        );
        let registry: Weak<AgentRegistry> = Arc::downgrade(&self.registry);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let reaped = registry.reap_stale_agents(grace_factor);
                if !reaped.is_empty() {
                    warn!("Watchdog reaped stale agents: {:?}", reaped);
                }
            }
        }));
    }

    /// Stop the watchdog task, if one is running
    pub fn stop_watchdog(&self) {
        if let Some(handle) = self.watchdog.lock().take() {
            handle.abort();
            info!("Stopped watchdog");
        }
    }

    /// Stop background tasks and every running agent, best-effort
    pub async fn shutdown(&self) {
        self.loader.stop_auto_scan();
        self.loader.unwatch_modules();
        self.stop_watchdog();

        for agent_id in self.registry.agent_ids() {
            let Some(engine) = self.registry.get_handle(&agent_id) else {
                continue;
            };
            if engine.status() == AgentStatus::Running {
                if let Err(e) = engine.stop().await {
                    warn!("Shutdown: failed to stop agent {}: {}", agent_id, e);
                }
            }
        }
        info!("Runtime shut down");
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.lock().take() {
            handle.abort();
        }
    }
}
