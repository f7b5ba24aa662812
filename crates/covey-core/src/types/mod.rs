//! Shared type definitions

mod agent_types;
mod module_types;

pub use agent_types::{AgentConfig, AgentRuntimeState, AgentStatus, RegistryStats};
pub use module_types::{
    LoaderStats, ModuleChange, ModuleDescriptor, ModuleLoadStatus, ModuleManifest,
};
