//! Hook list persisted as a JSON file.

use crate::models::Hook;
use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File-backed hook storage.
///
/// The whole list is stored as one JSON array and rewritten on every save.
#[derive(Debug, Clone)]
pub struct HookStorage {
    path: PathBuf,
}

impl HookStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored hooks. A missing file yields one default hook.
    pub fn load(&self) -> Result<Vec<Hook>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No hook file found, starting with default hook");
            return Ok(vec![Hook::default()]);
        }

        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read hooks from {}", self.path.display()))?;
        let mut hooks: Vec<Hook> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid hook file {}", self.path.display()))?;
        for hook in &mut hooks {
            hook.ensure_id();
        }

        debug!(path = %self.path.display(), count = hooks.len(), "Hooks loaded");
        Ok(hooks)
    }

    /// Replace the stored hooks. The file is swapped in atomically.
    pub fn save(&self, hooks: &[Hook]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let json = serde_json::to_vec_pretty(hooks)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to write hooks to {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = hooks.len(), "Hooks saved");
        Ok(())
    }
}
