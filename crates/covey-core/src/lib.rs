//! Covey Core Library
//!
//! This crate provides the core functionality for Covey, including:
//! - Per-agent lifecycle engines (state machine, retries, heartbeats)
//! - A central agent registry with discovery and health queries
//! - Dynamic module loading with content-digest change tracking
//! - A bulk orchestration facade and a runtime composition root
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       covey-core                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  agent/     - behavior contract, engine, registry, manager  │
//! │  loader/    - behavior catalog, scanner, module loader      │
//! │  config.rs  - per-agent JSON descriptor store               │
//! │  runtime.rs - composition root, bootstrap, watchdog         │
//! │  types/     - shared type definitions                       │
//! │  error.rs   - error types                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loadable modules are `*.agent.json` manifests naming an agent
//! class; classes are native Rust [`AgentBehavior`] implementations
//! registered in a [`BehaviorCatalog`] at process start. Manifests can
//! be re-scanned and re-bound at runtime; swapping the native code
//! behind a class requires a process restart.

pub mod agent;
pub mod config;
pub mod error;
pub mod loader;
pub mod runtime;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

// Re-export agent components
pub use agent::{
    AgentBehavior, AgentContext, AgentEngine, AgentManager, AgentRegistry, BulkOutcome,
    CancelToken, DEFAULT_HEALTH_FACTOR,
};

// Re-export loader components
pub use loader::{BehaviorCatalog, BehaviorFactory, ModuleLoader, ModuleScanner, MODULE_SUFFIX};

// Re-export config store and runtime
pub use config::ConfigStore;
pub use runtime::{AgentRuntime, RuntimeOptions};
