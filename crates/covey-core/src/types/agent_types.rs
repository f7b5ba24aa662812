//! Agent configuration and runtime state types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Agent configuration, persisted as one JSON descriptor per instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds between initialize() retry attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// Seconds between heartbeat snapshots published to the registry
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: f64,
    /// Seconds stop() waits for the execution context to exit
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_agent_type() -> String {
    "generic".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_heartbeat_interval() -> f64 {
    5.0
}

fn default_timeout() -> f64 {
    10.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AgentConfig {
    /// Create a new agent configuration with defaults
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            agent_type: agent_type.into(),
            capabilities: BTreeSet::new(),
            auto_start: false,
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            heartbeat_interval: default_heartbeat_interval(),
            timeout: default_timeout(),
            log_level: default_log_level(),
        }
    }

    /// Add a capability tag
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Parse a config descriptor from JSON, validating required fields
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("missing field") {
                // serde reports `missing field `agent_id` at ...`
                let field = msg
                    .split('`')
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string();
                ConfigError::MissingField(field)
            } else {
                ConfigError::Malformed {
                    path: "<inline>".to_string(),
                    reason: msg,
                }
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config descriptor from a JSON file
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConfigError::NotFound(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents).map_err(|e| match e {
            ConfigError::Malformed { reason, .. } => ConfigError::Malformed {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Validate field constraints beyond what serde enforces
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::MissingField("agent_id".to_string()));
        }
        if self.agent_name.trim().is_empty() {
            return Err(ConfigError::MissingField("agent_name".to_string()));
        }
        for (field, value) in [
            ("retry_delay", self.retry_delay),
            ("heartbeat_interval", self.heartbeat_interval),
            ("timeout", self.timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a positive number of seconds, got {}", value),
                });
            }
        }
        Ok(())
    }

    /// Delay between initialize() retry attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }

    /// Interval between heartbeat snapshots
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval)
    }

    /// How long stop() waits for the execution context to exit
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Total initialize() attempts before giving up (at least one)
    pub fn attempt_budget(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Instantiated, never started
    Created,
    /// initialize() in progress (possibly retrying)
    Initializing,
    /// run() loop active
    Running,
    /// Cancellation signalled, waiting for the run loop to exit
    Stopping,
    /// Run loop exited and cleanup finished
    Stopped,
    /// Unrecoverable failure
    Error,
}

impl AgentStatus {
    /// Whether the agent's execution context may still be live
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Running | Self::Stopping)
    }

    /// Stable lowercase name used in stats maps and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable runtime state owned by one agent's lifecycle engine.
///
/// The registry only ever sees value copies of this, published on
/// heartbeats and status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeState {
    pub status: AgentStatus,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub error_count: u32,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
}

impl AgentRuntimeState {
    pub fn new() -> Self {
        Self {
            status: AgentStatus::Created,
            tasks_completed: 0,
            tasks_failed: 0,
            error_count: 0,
            start_time: None,
            last_heartbeat: None,
        }
    }

    /// Stamp a fresh heartbeat
    pub fn record_heartbeat(&mut self) {
        self.last_heartbeat = Some(chrono::Utc::now());
    }

    /// Age of the last heartbeat, if one was ever recorded
    pub fn heartbeat_age(&self, now: chrono::DateTime<chrono::Utc>) -> Option<chrono::Duration> {
        self.last_heartbeat.map(|hb| now - hb)
    }
}

impl Default for AgentRuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate registry view: agent counts grouped by status and type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_agents: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}
