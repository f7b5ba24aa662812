//! Thread-safe directory of live agent engines
//!
//! The registry is constructed once at the composition root and passed
//! by reference to every component that needs discovery or health
//! data. A single lock guards the entry map; every read hands back
//! copies of snapshot data so callers never hold a reference into
//! protected state.

use crate::agent::engine::AgentEngine;
use crate::error::RegistryError;
use crate::types::{AgentRuntimeState, AgentStatus, RegistryStats};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Default multiplier applied to an agent's heartbeat interval when
/// deciding whether it still counts as healthy.
pub const DEFAULT_HEALTH_FACTOR: f64 = 2.0;

/// One registered agent: latest published snapshot plus discovery data.
///
/// Holds only a weak reference to the engine so a stopped agent is not
/// kept alive by its registry entry.
struct RegistryEntry {
    snapshot: AgentRuntimeState,
    capabilities: BTreeSet<String>,
    agent_type: String,
    heartbeat_interval: f64,
    handle: Weak<AgentEngine>,
}

/// Central agent directory
pub struct AgentRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
    health_factor: f64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::with_health_factor(DEFAULT_HEALTH_FACTOR)
    }

    pub fn with_health_factor(health_factor: f64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            health_factor,
        }
    }

    /// Register a freshly created engine.
    ///
    /// Fails if the agent id is already present; the existing entry is
    /// left untouched.
    pub fn register_agent(&self, engine: &Arc<AgentEngine>) -> Result<(), RegistryError> {
        let config = engine.config();
        let mut entries = self.entries.lock();

        if entries.contains_key(&config.agent_id) {
            return Err(RegistryError::AlreadyRegistered(config.agent_id.clone()));
        }

        debug!(
            "Registering agent {} (type {})",
            config.agent_id, config.agent_type
        );

        entries.insert(
            config.agent_id.clone(),
            RegistryEntry {
                snapshot: engine.snapshot(),
                capabilities: config.capabilities.clone(),
                agent_type: config.agent_type.clone(),
                heartbeat_interval: config.heartbeat_interval,
                handle: Arc::downgrade(engine),
            },
        );
        Ok(())
    }

    /// Remove an agent's entry.
    ///
    /// Refused while the agent's execution context may still be live
    /// (INITIALIZING, RUNNING, STOPPING); stop it first.
    pub fn deregister_agent(&self, agent_id: &str) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get(agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;

        if entry.snapshot.status.is_active() {
            return Err(RegistryError::StillActive(agent_id.to_string()));
        }

        entries.remove(agent_id);
        debug!("Deregistered agent {}", agent_id);
        Ok(())
    }

    /// Record a fresh state snapshot for an agent.
    ///
    /// Called by the lifecycle engine on every heartbeat and status
    /// transition. A missing entry is tolerated: the agent may have
    /// been reaped while its task was still winding down.
    pub(crate) fn publish_snapshot(&self, agent_id: &str, snapshot: AgentRuntimeState) {
        let mut entries = self.entries.lock();
        match entries.get_mut(agent_id) {
            Some(entry) => entry.snapshot = snapshot,
            None => debug!("Dropping snapshot for unregistered agent {}", agent_id),
        }
    }

    /// Latest published snapshot for an agent
    pub fn get_status(&self, agent_id: &str) -> Option<AgentRuntimeState> {
        self.entries
            .lock()
            .get(agent_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Live handle for an agent, if it is still around
    pub fn get_handle(&self, agent_id: &str) -> Option<Arc<AgentEngine>> {
        self.entries
            .lock()
            .get(agent_id)
            .and_then(|entry| entry.handle.upgrade())
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.entries.lock().contains_key(agent_id)
    }

    /// All registered agent ids, sorted
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of agents passing the health predicate:
    /// RUNNING with a heartbeat younger than `heartbeat_interval × health_factor`
    pub fn get_healthy_agents(&self) -> Vec<String> {
        let now = chrono::Utc::now();
        let entries = self.entries.lock();
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| Self::entry_is_healthy(entry, self.health_factor, now))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of agents declaring the given capability, sorted
    pub fn get_by_capability(&self, capability: &str) -> Vec<String> {
        let entries = self.entries.lock();
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.capabilities.contains(capability))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Agent counts grouped by status and by agent type
    pub fn get_registry_stats(&self) -> RegistryStats {
        let entries = self.entries.lock();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();

        for entry in entries.values() {
            *by_status
                .entry(entry.snapshot.status.as_str().to_string())
                .or_insert(0) += 1;
            *by_type.entry(entry.agent_type.clone()).or_insert(0) += 1;
        }

        RegistryStats {
            total_agents: entries.len(),
            by_status,
            by_type,
        }
    }

    /// Number of agents currently in the given status
    pub fn count_by_status(&self, status: AgentStatus) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.snapshot.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Force-mark agents with stale heartbeats as ERROR and drop them.
    ///
    /// An agent is stale when its snapshot says RUNNING but no
    /// heartbeat has landed within `heartbeat_interval × grace_factor`.
    /// This covers execution contexts that died without reaching
    /// `stop()`. Returns the reaped ids, sorted.
    pub fn reap_stale_agents(&self, grace_factor: f64) -> Vec<String> {
        let now = chrono::Utc::now();
        let mut entries = self.entries.lock();

        let mut reaped: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| {
                entry.snapshot.status == AgentStatus::Running
                    && !Self::entry_is_healthy(entry, grace_factor, now)
            })
            .map(|(id, _)| id.clone())
            .collect();
        reaped.sort();

        for id in &reaped {
            if let Some(entry) = entries.get_mut(id) {
                warn!("Agent {} heartbeat stale past grace period, marking ERROR", id);
                entry.snapshot.status = AgentStatus::Error;
            }
            entries.remove(id);
        }
        reaped
    }

    fn entry_is_healthy(
        entry: &RegistryEntry,
        factor: f64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        if entry.snapshot.status != AgentStatus::Running {
            return false;
        }
        let budget_ms = entry.heartbeat_interval * factor * 1000.0;
        match entry.snapshot.heartbeat_age(now) {
            Some(age) => (age.num_milliseconds() as f64) < budget_ms,
            None => false,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
