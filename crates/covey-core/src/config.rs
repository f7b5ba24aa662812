//! Per-agent JSON configuration store
//!
//! One descriptor per agent instance, `<agent_id>.json`, in a
//! configured directory. Descriptors feed `create_agent`; the
//! `agent_type` field doubles as the module the instance is created
//! from during bootstrap.

use crate::error::{ConfigError, Error, Result};
use crate::types::AgentConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory-backed store of agent config descriptors
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default config root under the platform data directory
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("covey")
            .join("agents")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn descriptor_path(&self, agent_id: &str) -> PathBuf {
        self.root.join(format!("{agent_id}.json"))
    }

    /// Load and validate one agent's descriptor.
    ///
    /// The descriptor's `agent_id` must match its filename; a mismatch
    /// is a configuration error, not something to silently repair.
    pub async fn load(&self, agent_id: &str) -> Result<AgentConfig> {
        let path = self.descriptor_path(agent_id);
        let config = AgentConfig::from_json_file(&path).await.map_err(Error::Config)?;

        if config.agent_id != agent_id {
            return Err(ConfigError::InvalidValue {
                field: "agent_id".to_string(),
                reason: format!(
                    "descriptor {} carries agent_id {}",
                    path.display(),
                    config.agent_id
                ),
            }
            .into());
        }
        Ok(config)
    }

    /// Load every valid descriptor in the config root, sorted by
    /// agent id. Malformed descriptors are logged and skipped so one
    /// bad file cannot take down a whole bootstrap.
    pub async fn load_all(&self) -> Result<Vec<AgentConfig>> {
        let mut configs = Vec::new();
        if !self.root.exists() {
            debug!("Config root {:?} does not exist yet", self.root);
            return Ok(configs);
        }

        for entry in WalkDir::new(&self.root)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            match AgentConfig::from_json_file(path).await {
                Ok(config) => configs.push(config),
                Err(e) => warn!("Skipping config descriptor {:?}: {}", path, e),
            }
        }

        configs.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(configs)
    }

    /// Persist a descriptor as pretty-printed JSON
    pub async fn save(&self, config: &AgentConfig) -> Result<()> {
        config.validate().map_err(Error::Config)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.descriptor_path(&config.agent_id);
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&path, json).await?;
        debug!("Saved config descriptor {:?}", path);
        Ok(())
    }
}
