//! Agent lifecycle management
//!
//! This module handles:
//! - The pluggable behavior contract (initialize/run/cleanup)
//! - The per-agent lifecycle engine (state machine, retries, heartbeat)
//! - The central registry (discovery, health, stats)
//! - The bulk orchestration facade

mod behavior;
mod engine;
mod manager;
mod registry;

pub use behavior::{AgentBehavior, AgentContext, CancelToken};
pub use engine::AgentEngine;
pub use manager::{AgentManager, BulkOutcome};
pub use registry::{AgentRegistry, DEFAULT_HEALTH_FACTOR};
