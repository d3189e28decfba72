use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Archive loading limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Archives larger than this are rejected before parsing.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("archive.max_bytes must be greater than 0".into());
        }
        Ok(())
    }
}

/// Persistent state between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Failed-item ledger file. The CLI falls back to a file under the
    /// user data directory.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

/// Run report export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Directory reports are written to. Defaults to the working directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Write a report automatically when a run finishes.
    #[serde(default = "default_true")]
    pub auto_export: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: None,
            auto_export: true,
        }
    }
}

fn default_true() -> bool {
    true
}
