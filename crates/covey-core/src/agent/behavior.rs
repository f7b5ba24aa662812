//! The capability contract every loadable agent implements
//!
//! A behavior is the pluggable half of an agent: the lifecycle engine
//! owns the state machine, heartbeats and retries, and calls into the
//! behavior at three points: `initialize()`, `run()`, `cleanup()`.
//! Errors returned from any hook are caught at the hook boundary and
//! reflected in the agent's runtime state; they never cross into the
//! host process.

use crate::types::AgentRuntimeState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Pluggable agent implementation.
///
/// `run()` must observe the cancellation signal on `ctx` at the start
/// of each work unit and during internal waits; cancellation is
/// strictly cooperative and the engine never aborts the task.
#[async_trait]
pub trait AgentBehavior: Send {
    /// Prepare resources. Retried by the engine per the config's
    /// retry policy; an error counts against the attempt budget.
    async fn initialize(&mut self) -> anyhow::Result<()>;

    /// Perform work until cancelled or done.
    async fn run(&mut self, ctx: &mut AgentContext) -> anyhow::Result<()>;

    /// Best-effort teardown. Errors are logged, never re-raised.
    async fn cleanup(&mut self) -> anyhow::Result<()>;
}

/// Cooperative cancellation signal handed to `run()`.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&mut self) {
        // A dropped sender means the engine is gone; treat as cancelled.
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sending side of the cancellation signal, owned by the engine.
#[derive(Debug)]
pub(crate) struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Execution context passed into the `run()` hook.
///
/// Carries the cancellation token and recorders for per-task
/// statistics; counters land in the agent's runtime state and reach
/// the registry with the next heartbeat.
pub struct AgentContext {
    agent_id: String,
    cancel: CancelToken,
    state: Arc<Mutex<AgentRuntimeState>>,
}

impl AgentContext {
    pub(crate) fn new(
        agent_id: impl Into<String>,
        cancel: CancelToken,
        state: Arc<Mutex<AgentRuntimeState>>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            cancel,
            state,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve once the engine signals cancellation.
    pub async fn cancelled(&mut self) {
        self.cancel.cancelled().await;
    }

    /// Record one successfully completed unit of work.
    pub fn task_completed(&self) {
        self.state.lock().tasks_completed += 1;
    }

    /// Record one failed unit of work.
    pub fn task_failed(&self) {
        self.state.lock().tasks_failed += 1;
    }

    /// Sleep that wakes early on cancellation.
    ///
    /// Returns true if the full duration elapsed, false if the wait
    /// was cut short by cancellation.
    pub async fn idle(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(source: &CancelSource) -> AgentContext {
        AgentContext::new(
            "test-agent",
            source.token(),
            Arc::new(Mutex::new(AgentRuntimeState::new())),
        )
    }

    #[test]
    fn test_cancel_token_flag() {
        let source = CancelSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_resolves_after_signal() {
        tokio_test::block_on(async {
            let source = CancelSource::new();
            let mut token = source.token();
            source.cancel();
            token.cancelled().await;
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_elapses_without_cancel() {
        let source = CancelSource::new();
        let mut ctx = context(&source);
        assert!(ctx.idle(Duration::from_millis(50)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_cut_short_by_cancel() {
        let source = CancelSource::new();
        let mut ctx = context(&source);
        source.cancel();
        assert!(!ctx.idle(Duration::from_secs(3600)).await);
    }

    #[test]
    fn test_context_counters() {
        let source = CancelSource::new();
        let state = Arc::new(Mutex::new(AgentRuntimeState::new()));
        let ctx = AgentContext::new("t", source.token(), Arc::clone(&state));
        ctx.task_completed();
        ctx.task_completed();
        ctx.task_failed();
        let snapshot = state.lock().clone();
        assert_eq!(snapshot.tasks_completed, 2);
        assert_eq!(snapshot.tasks_failed, 1);
    }
}
