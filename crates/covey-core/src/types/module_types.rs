//! Module descriptor and manifest types used by the dynamic loader

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Load state of a discovered module
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleLoadStatus {
    /// Seen on disk, class not yet resolved
    Discovered,
    /// Manifest parsed and agent class bound
    Loaded,
    /// Last load attempt failed (see error_message)
    Failed,
}

/// Classification of a module file relative to the previous scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleChange {
    New,
    Unchanged,
    Modified,
    Removed,
}

/// Bookkeeping record for one loadable unit, owned by the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub module_name: String,
    pub module_path: PathBuf,
    /// Lowercase hex SHA-256 of the module file contents
    pub content_digest: String,
    pub agent_class_name: Option<String>,
    pub load_status: ModuleLoadStatus,
    pub error_message: Option<String>,
    pub last_loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ModuleDescriptor {
    pub fn discovered(
        module_name: impl Into<String>,
        module_path: impl Into<PathBuf>,
        content_digest: impl Into<String>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            module_path: module_path.into(),
            content_digest: content_digest.into(),
            agent_class_name: None,
            load_status: ModuleLoadStatus::Discovered,
            error_message: None,
            last_loaded_at: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.load_status == ModuleLoadStatus::Loaded
    }
}

/// Parsed contents of a `<name>.agent.json` loadable unit.
///
/// The manifest names the agent class implementing the behavior
/// contract; the class itself must be registered in the
/// `BehaviorCatalog` of the hosting process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub agent_class: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ModuleManifest {
    /// Parse and sanity-check a manifest
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let manifest: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if manifest.agent_class.trim().is_empty() {
            return Err("agent_class must not be empty".to_string());
        }
        Ok(manifest)
    }
}

/// Aggregate loader view: module counts plus registry-derived agent counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderStats {
    pub total_modules: usize,
    pub loaded_modules: usize,
    pub failed_modules: usize,
    pub total_agents: usize,
    pub running_agents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse() {
        let manifest = ModuleManifest::from_json_str(
            r#"{"agent_class": "counter", "description": "counts", "capabilities": ["count"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.agent_class, "counter");
        assert_eq!(manifest.capabilities, vec!["count".to_string()]);
    }

    #[test]
    fn test_manifest_rejects_empty_class() {
        assert!(ModuleManifest::from_json_str(r#"{"agent_class": "  "}"#).is_err());
        assert!(ModuleManifest::from_json_str(r#"{}"#).is_err());
    }

    #[test]
    fn test_descriptor_discovered_state() {
        let desc = ModuleDescriptor::discovered("counter", "/mods/counter.agent.json", "abc123");
        assert_eq!(desc.load_status, ModuleLoadStatus::Discovered);
        assert!(!desc.is_loaded());
        assert!(desc.agent_class_name.is_none());
        assert!(desc.error_message.is_none());
    }
}
