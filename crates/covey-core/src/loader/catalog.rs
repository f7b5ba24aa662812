//! Registration table of named agent behavior factories
//!
//! Native Rust code cannot be swapped at runtime, so loadable modules
//! name a class that must be registered here at compile time by the
//! hosting process (the composition root). The loader resolves
//! manifest `agent_class` entries against this table; picking up a new
//! native implementation requires a process restart, while manifests
//! themselves can be re-scanned and re-bound freely.

use crate::agent::AgentBehavior;
use crate::types::AgentConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for one behavior class; called once per created agent
pub type BehaviorFactory = Arc<dyn Fn(&AgentConfig) -> Box<dyn AgentBehavior> + Send + Sync>;

/// Immutable-after-construction catalog of behavior classes
#[derive(Clone, Default)]
pub struct BehaviorCatalog {
    factories: HashMap<String, BehaviorFactory>,
}

impl BehaviorCatalog {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a behavior class under a name
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F)
    where
        F: Fn(&AgentConfig) -> Box<dyn AgentBehavior> + Send + Sync + 'static,
    {
        self.factories.insert(class_name.into(), Arc::new(factory));
    }

    /// Builder-style registration
    pub fn with_behavior<F>(mut self, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&AgentConfig) -> Box<dyn AgentBehavior> + Send + Sync + 'static,
    {
        self.register(class_name, factory);
        self
    }

    pub fn resolve(&self, class_name: &str) -> Option<BehaviorFactory> {
        self.factories.get(class_name).cloned()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for BehaviorCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorCatalog")
            .field("classes", &self.class_names())
            .finish()
    }
}
