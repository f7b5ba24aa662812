//! Module directory scanning and content digests

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Loadable-unit naming convention: one `<name>.agent.json` per module
pub const MODULE_SUFFIX: &str = ".agent.json";

/// A module file present on disk right now
#[derive(Debug, Clone)]
pub struct ModuleFile {
    pub path: PathBuf,
    pub digest: String,
}

/// Lists loadable units in the module root and digests their contents
#[derive(Debug, Clone)]
pub struct ModuleScanner {
    root: PathBuf,
}

impl ModuleScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Module name for a path following the naming convention
    pub fn module_name_of(path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        file_name
            .strip_suffix(MODULE_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
    }

    /// Current on-disk view: module name → path + content digest.
    ///
    /// Non-recursive; files not matching the naming convention are
    /// ignored. A missing root directory is an empty view, not an
    /// error, so scans stay idempotent while the host provisions it.
    pub async fn snapshot(&self) -> Result<BTreeMap<String, ModuleFile>> {
        let mut files = BTreeMap::new();
        if !self.root.exists() {
            debug!("Module root {:?} does not exist yet", self.root);
            return Ok(files);
        }

        let pattern = self.root.join(format!("*{}", MODULE_SUFFIX));
        let paths = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| Error::Internal(format!("Bad module glob pattern: {}", e)))?;

        for entry in paths.filter_map(|p| p.ok()) {
            if !entry.is_file() {
                continue;
            }
            let Some(name) = Self::module_name_of(&entry) else {
                continue;
            };
            let digest = Self::digest_file(&entry).await?;
            files.insert(name, ModuleFile {
                path: entry,
                digest,
            });
        }
        Ok(files)
    }

    /// Compute the SHA-256 content digest of a file, lowercase hex
    pub async fn digest_file(path: impl AsRef<Path>) -> Result<String> {
        let mut file = tokio::fs::File::open(path.as_ref()).await?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Digest of in-memory bytes; matches `digest_file` for the same contents
    pub fn digest_bytes(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}
