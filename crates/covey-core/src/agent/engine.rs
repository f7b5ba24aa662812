//! Agent lifecycle engine
//!
//! Wraps one pluggable behavior and drives its state machine:
//!
//! ```text
//! CREATED ──start()──▶ INITIALIZING ──ok──▶ RUNNING ──stop()/fatal──▶ STOPPING ──▶ STOPPED
//!                          │  ▲                                                      │
//!                          │  └─ retry (≤ budget, spaced by retry_delay)             │
//!                          ▼                                                         ▼
//!                        ERROR ◀──────────────────────── stop timeout / faulted task
//! ```
//!
//! Each started agent gets a dedicated tokio task that runs the
//! initialize/run/cleanup hooks and publishes heartbeat snapshots to
//! the registry. Hook errors are caught at the hook boundary; nothing
//! escapes the task to crash the host process.

use crate::agent::behavior::{AgentBehavior, AgentContext, CancelSource};
use crate::agent::registry::AgentRegistry;
use crate::error::{Error, LifecycleError, Result};
use crate::types::{AgentConfig, AgentRuntimeState, AgentStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared pieces the lifecycle task needs after `start()` returns
struct EngineShared {
    config: AgentConfig,
    state: Arc<Mutex<AgentRuntimeState>>,
    behavior_slot: Arc<Mutex<Option<Box<dyn AgentBehavior>>>>,
    registry: Arc<AgentRegistry>,
}

impl EngineShared {
    fn publish(&self) {
        let snapshot = self.state.lock().clone();
        self.registry
            .publish_snapshot(&self.config.agent_id, snapshot);
    }
}

/// Lifecycle engine for a single agent
pub struct AgentEngine {
    config: AgentConfig,
    state: Arc<Mutex<AgentRuntimeState>>,
    /// The behavior lives here between runs and inside the lifecycle
    /// task while one is active.
    behavior: Arc<Mutex<Option<Box<dyn AgentBehavior>>>>,
    cancel: Mutex<Option<CancelSource>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    registry: Arc<AgentRegistry>,
}

impl AgentEngine {
    pub fn new(
        config: AgentConfig,
        behavior: Box<dyn AgentBehavior>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(AgentRuntimeState::new())),
            behavior: Arc::new(Mutex::new(Some(behavior))),
            cancel: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn status(&self) -> AgentStatus {
        self.state.lock().status
    }

    /// Copy of the current runtime state
    pub fn snapshot(&self) -> AgentRuntimeState {
        self.state.lock().clone()
    }

    /// Start the agent. Callable from CREATED or STOPPED.
    ///
    /// Spawns the dedicated execution context, then waits for the
    /// initialization phase to settle: Ok means the agent reached
    /// RUNNING, Err means retries were exhausted (agent is ERROR).
    pub async fn start(&self) -> Result<()> {
        let behavior = {
            let mut state = self.state.lock();
            match state.status {
                AgentStatus::Created | AgentStatus::Stopped => {}
                from => {
                    return Err(LifecycleError::InvalidStart {
                        agent_id: self.config.agent_id.clone(),
                        from,
                    }
                    .into());
                }
            }
            let Some(behavior) = self.behavior.lock().take() else {
                return Err(Error::Internal(format!(
                    "behavior for {} is not available",
                    self.config.agent_id
                )));
            };
            state.status = AgentStatus::Initializing;
            behavior
        };
        self.publish_current();
        info!("Starting agent: {}", self.config.agent_id);

        let source = CancelSource::new();
        let token = source.token();
        *self.cancel.lock() = Some(source);

        let shared = EngineShared {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            behavior_slot: Arc::clone(&self.behavior),
            registry: Arc::clone(&self.registry),
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        let handle = tokio::spawn(run_lifecycle(shared, behavior, token, ack_tx));
        *self.task.lock().await = Some(handle);

        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(attempts)) => Err(LifecycleError::InitRetriesExhausted {
                agent_id: self.config.agent_id.clone(),
                attempts,
            }
            .into()),
            Err(_) => {
                // The task died before acknowledging (a panicking hook)
                self.state.lock().status = AgentStatus::Error;
                self.publish_current();
                Err(LifecycleError::Faulted(self.config.agent_id.clone()).into())
            }
        }
    }

    /// Stop the agent: signal cancellation, wait up to the configured
    /// timeout for the execution context to exit.
    ///
    /// An agent that ignores cancellation past the timeout is marked
    /// ERROR and left to wind down on its own; it is never aborted,
    /// because forced termination cannot guarantee resource release.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.status != AgentStatus::Running {
                return Err(LifecycleError::NotRunning(self.config.agent_id.clone()).into());
            }
            state.status = AgentStatus::Stopping;
        }
        self.publish_current();
        info!("Stopping agent: {}", self.config.agent_id);

        if let Some(cancel) = self.cancel.lock().as_ref() {
            cancel.cancel();
        }

        let handle = self.task.lock().await.take();
        let Some(handle) = handle else {
            // No live task to wait for; nothing left to wind down
            self.state.lock().status = AgentStatus::Stopped;
            self.publish_current();
            return Ok(());
        };

        match tokio::time::timeout(self.config.stop_timeout(), handle).await {
            Ok(Ok(())) => {
                // Final status was set by the lifecycle task: STOPPED,
                // or ERROR if the run loop ended with a fatal error.
                info!("Agent stopped: {}", self.config.agent_id);
                Ok(())
            }
            Ok(Err(join_err)) => {
                error!(
                    "Agent {} execution context faulted: {}",
                    self.config.agent_id, join_err
                );
                self.state.lock().status = AgentStatus::Error;
                self.publish_current();
                Err(LifecycleError::Faulted(self.config.agent_id.clone()).into())
            }
            Err(_elapsed) => {
                warn!(
                    "Agent {} did not stop within {}s, marking ERROR",
                    self.config.agent_id, self.config.timeout
                );
                self.state.lock().status = AgentStatus::Error;
                self.publish_current();
                Err(LifecycleError::StopTimeout {
                    agent_id: self.config.agent_id.clone(),
                    timeout_secs: self.config.timeout,
                }
                .into())
            }
        }
    }

    fn publish_current(&self) {
        let snapshot = self.state.lock().clone();
        self.registry
            .publish_snapshot(&self.config.agent_id, snapshot);
    }
}

impl std::fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEngine")
            .field("agent_id", &self.config.agent_id)
            .field("status", &self.status())
            .finish()
    }
}

/// The dedicated execution context of one agent incarnation.
///
/// Drives initialize (with retries), run (multiplexed with the
/// heartbeat ticker), cleanup, and the final status transition. Always
/// returns the behavior to the engine's slot so the agent can be
/// restarted.
async fn run_lifecycle(
    shared: EngineShared,
    mut behavior: Box<dyn AgentBehavior>,
    cancel: crate::agent::behavior::CancelToken,
    ack: oneshot::Sender<std::result::Result<(), u32>>,
) {
    let agent_id = shared.config.agent_id.clone();
    let run_id = uuid::Uuid::new_v4().to_string();
    let run_id = &run_id[..8];
    debug!("Agent {} lifecycle {} spawned", agent_id, run_id);

    // Initialization, bounded by the retry budget
    let budget = shared.config.attempt_budget();
    let mut attempt = 0u32;
    let initialized = loop {
        attempt += 1;
        match behavior.initialize().await {
            Ok(()) => break true,
            Err(e) => {
                warn!(
                    "Agent {} initialize attempt {}/{} failed: {}",
                    agent_id, attempt, budget, e
                );
                shared.state.lock().error_count += 1;
                shared.publish();
                if attempt >= budget {
                    break false;
                }
                tokio::time::sleep(shared.config.retry_delay()).await;
            }
        }
    };

    if !initialized {
        error!(
            "Agent {} failed to initialize after {} attempts",
            agent_id, attempt
        );
        shared.state.lock().status = AgentStatus::Error;
        shared.publish();
        *shared.behavior_slot.lock() = Some(behavior);
        let _ = ack.send(Err(attempt));
        return;
    }

    {
        let mut state = shared.state.lock();
        state.status = AgentStatus::Running;
        state.start_time = Some(chrono::Utc::now());
        state.record_heartbeat();
    }
    shared.publish();
    info!("Agent {} running (lifecycle {})", agent_id, run_id);
    let _ = ack.send(Ok(()));

    // Run loop multiplexed with the heartbeat ticker
    let mut ctx = AgentContext::new(
        agent_id.as_str(),
        cancel,
        Arc::clone(&shared.state),
    );
    let mut ticker = tokio::time::interval(shared.config.heartbeat_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let run_result = {
        let run_fut = behavior.run(&mut ctx);
        tokio::pin!(run_fut);
        loop {
            tokio::select! {
                result = &mut run_fut => break result,
                _ = ticker.tick() => {
                    shared.state.lock().record_heartbeat();
                    shared.publish();
                }
            }
        }
    };

    let fatal = match run_result {
        Ok(()) => {
            debug!("Agent {} run loop exited", agent_id);
            false
        }
        Err(e) => {
            error!("Agent {} run loop failed: {}", agent_id, e);
            let mut state = shared.state.lock();
            state.error_count += 1;
            state.tasks_failed += 1;
            true
        }
    };

    // Fatal errors and voluntary exits pass through STOPPING too
    {
        let mut state = shared.state.lock();
        if state.status == AgentStatus::Running {
            state.status = AgentStatus::Stopping;
        }
    }
    shared.publish();

    if let Err(e) = behavior.cleanup().await {
        warn!("Agent {} cleanup failed: {}", agent_id, e);
        shared.state.lock().error_count += 1;
    }

    {
        let mut state = shared.state.lock();
        // A stop-timeout or watchdog may already have marked ERROR;
        // never walk that back to STOPPED.
        state.status = if fatal || state.status == AgentStatus::Error {
            AgentStatus::Error
        } else {
            AgentStatus::Stopped
        };
    }
    shared.publish();
    *shared.behavior_slot.lock() = Some(behavior);
    debug!("Agent {} lifecycle {} finished", agent_id, run_id);
}
