use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SyncError;

/// Persistent state carried between runs. Read once at startup and passed
/// around as a value; the caller persists it with `save` - immediately after
/// a fresh token is obtained, and again after a fully successful run with the
/// new last-sync timestamp.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SyncCache {
    pub token: Option<String>,
    /// ISO-8601 UTC timestamp of the last successful run.
    pub last_sync: Option<String>,
}

impl SyncCache {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SyncError::Io(format!("failed to parse cache {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SyncError::Io(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}
