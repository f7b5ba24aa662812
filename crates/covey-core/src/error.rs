//! Error types for Covey Core

use thiserror::Error;

/// Main error type for Covey operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Agent configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config descriptor not found: {0}")]
    NotFound(String),

    #[error("Malformed config descriptor {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Agent lifecycle errors
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Agent {agent_id} cannot start from {from:?}")]
    InvalidStart {
        agent_id: String,
        from: crate::types::AgentStatus,
    },

    #[error("Agent {agent_id} failed to initialize after {attempts} attempts")]
    InitRetriesExhausted { agent_id: String, attempts: u32 },

    #[error("Agent not running: {0}")]
    NotRunning(String),

    #[error("Agent {agent_id} did not stop within {timeout_secs}s")]
    StopTimeout { agent_id: String, timeout_secs: f64 },

    #[error("Agent {0} execution context faulted")]
    Faulted(String),
}

/// Module loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module not loaded: {0}")]
    NotLoaded(String),

    #[error("Module {module} changed on disk since it was loaded")]
    StaleDigest { module: String },

    #[error("Unknown agent class {class} in module {module}")]
    UnknownAgentClass { module: String, class: String },

    #[error("Invalid manifest for module {module}: {reason}")]
    InvalidManifest { module: String, reason: String },

    #[error("Module watch error: {0}")]
    Watch(String),
}

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Agent already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Agent not registered: {0}")]
    NotFound(String),

    #[error("Agent still active: {0}")]
    StillActive(String),
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
