use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{BUILD_RECORD_FILE, STATE_DIR};

/// Written into the runtime root at the end of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub app: String,
    /// Target selected by the operator at build time, if any
    pub target: Option<String>,
    pub dependency_fingerprint: String,
    pub data_artifact: Option<String>,
    pub built_at: DateTime<Utc>,
}

pub fn path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(BUILD_RECORD_FILE)
}

impl BuildRecord {
    pub fn write(&self, root: &Path) -> Result<()> {
        let path = path(root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write build record: {}", path.display()))
    }

    /// `Ok(None)` when no build has run in this root.
    pub fn read(root: &Path) -> Result<Option<Self>> {
        let path = path(root);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read build record: {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt build record: {}", path.display()))?;
        Ok(Some(record))
    }
}
