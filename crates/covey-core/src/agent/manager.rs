//! Bulk orchestration facade over a set of agent engines
//!
//! The manager holds no truth of its own: state lives in the registry
//! and in the individual engines. It exists so hosts can start/stop a
//! fleet and get per-agent outcomes instead of a first-failure abort.

use crate::agent::engine::AgentEngine;
use crate::agent::registry::AgentRegistry;
use crate::error::Result;
use crate::types::{AgentRuntimeState, AgentStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-agent outcomes of a bulk operation, keyed by agent id
pub type BulkOutcome = HashMap<String, Result<()>>;

/// Stateless facade for bulk start/stop/query across a set of agents
pub struct AgentManager {
    agents: Vec<Arc<AgentEngine>>,
    registry: Arc<AgentRegistry>,
}

impl AgentManager {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            agents: Vec::new(),
            registry,
        }
    }

    pub fn with_agents(registry: Arc<AgentRegistry>, agents: Vec<Arc<AgentEngine>>) -> Self {
        Self { agents, registry }
    }

    /// Add an engine to the managed set
    pub fn adopt(&mut self, engine: Arc<AgentEngine>) {
        self.agents.push(engine);
    }

    pub fn agents(&self) -> &[Arc<AgentEngine>] {
        &self.agents
    }

    /// Start every managed agent, concurrently.
    ///
    /// Never aborts on partial failure; the returned map carries one
    /// outcome per agent.
    pub async fn start_all(&self) -> BulkOutcome {
        let outcomes = futures::future::join_all(self.agents.iter().map(|engine| async move {
            let result = engine.start().await;
            if let Err(e) = &result {
                warn!("Failed to start agent {}: {}", engine.id(), e);
            }
            (engine.id().to_string(), result)
        }))
        .await;

        let outcomes: BulkOutcome = outcomes.into_iter().collect();
        let started = outcomes.values().filter(|r| r.is_ok()).count();
        info!("Started {} of {} agents", started, outcomes.len());
        outcomes
    }

    /// Stop every managed agent, concurrently. Per-agent outcomes.
    pub async fn stop_all(&self) -> BulkOutcome {
        let outcomes = futures::future::join_all(self.agents.iter().map(|engine| async move {
            let result = engine.stop().await;
            if let Err(e) = &result {
                warn!("Failed to stop agent {}: {}", engine.id(), e);
            }
            (engine.id().to_string(), result)
        }))
        .await;

        let outcomes: BulkOutcome = outcomes.into_iter().collect();
        let stopped = outcomes.values().filter(|r| r.is_ok()).count();
        info!("Stopped {} of {} agents", stopped, outcomes.len());
        outcomes
    }

    /// Latest snapshot for every managed agent, read through the registry
    pub fn get_all_status(&self) -> HashMap<String, AgentRuntimeState> {
        self.agents
            .iter()
            .map(|engine| {
                let snapshot = self
                    .registry
                    .get_status(engine.id())
                    .unwrap_or_else(|| engine.snapshot());
                (engine.id().to_string(), snapshot)
            })
            .collect()
    }

    /// Managed agents currently passing the registry health predicate
    pub fn get_healthy_agents(&self) -> Vec<String> {
        let healthy = self.registry.get_healthy_agents();
        let mut ids: Vec<String> = self
            .agents
            .iter()
            .map(|engine| engine.id().to_string())
            .filter(|id| healthy.contains(id))
            .collect();
        ids.sort();
        ids
    }

    /// Managed agents whose latest snapshot says RUNNING
    pub fn get_running_agents(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .agents
            .iter()
            .filter(|engine| {
                self.registry
                    .get_status(engine.id())
                    .map(|s| s.status == AgentStatus::Running)
                    .unwrap_or(false)
            })
            .map(|engine| engine.id().to_string())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::behavior::{AgentBehavior, AgentContext};
    use crate::error::{Error, LifecycleError};
    use crate::types::AgentConfig;
    use async_trait::async_trait;

    struct Worker {
        init_ok: bool,
    }

    #[async_trait]
    impl AgentBehavior for Worker {
        async fn initialize(&mut self) -> anyhow::Result<()> {
            if self.init_ok {
                Ok(())
            } else {
                anyhow::bail!("refusing to initialize")
            }
        }

        async fn run(&mut self, ctx: &mut AgentContext) -> anyhow::Result<()> {
            ctx.cancelled().await;
            Ok(())
        }

        async fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn fleet(registry: &Arc<AgentRegistry>) -> AgentManager {
        let mut manager = AgentManager::new(Arc::clone(registry));
        for (id, init_ok) in [("good-1", true), ("good-2", true), ("bad-1", false)] {
            let mut config = AgentConfig::new(id, id, "worker");
            config.max_retries = 1;
            config.retry_delay = 0.01;
            let engine = Arc::new(AgentEngine::new(
                config,
                Box::new(Worker { init_ok }),
                Arc::clone(registry),
            ));
            registry.register_agent(&engine).unwrap();
            manager.adopt(engine);
        }
        manager
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_all_reports_per_agent_outcomes() {
        let registry = Arc::new(AgentRegistry::new());
        let manager = fleet(&registry);

        let outcomes = manager.start_all().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes["good-1"].is_ok());
        assert!(outcomes["good-2"].is_ok());
        assert!(matches!(
            outcomes["bad-1"],
            Err(Error::Lifecycle(LifecycleError::InitRetriesExhausted { .. }))
        ));

        assert_eq!(
            manager.get_running_agents(),
            vec!["good-1".to_string(), "good-2".to_string()]
        );

        manager.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_tolerates_not_running() {
        let registry = Arc::new(AgentRegistry::new());
        let manager = fleet(&registry);
        manager.start_all().await;

        let outcomes = manager.stop_all().await;
        assert!(outcomes["good-1"].is_ok());
        assert!(outcomes["good-2"].is_ok());
        // Never reached RUNNING, so there is nothing to stop
        assert!(matches!(
            outcomes["bad-1"],
            Err(Error::Lifecycle(LifecycleError::NotRunning(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_views() {
        let registry = Arc::new(AgentRegistry::new());
        let manager = fleet(&registry);
        manager.start_all().await;

        let all = manager.get_all_status();
        assert_eq!(all.len(), 3);
        assert_eq!(all["good-1"].status, AgentStatus::Running);
        assert_eq!(all["bad-1"].status, AgentStatus::Error);

        assert_eq!(
            manager.get_healthy_agents(),
            vec!["good-1".to_string(), "good-2".to_string()]
        );

        manager.stop_all().await;
    }
}
