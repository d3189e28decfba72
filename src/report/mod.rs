//! Run report export and the completion summary.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{CountersSnapshot, PassSummary, StopReason};

pub const REPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub stats: CountersSnapshot,
    pub duration: ReportDuration,
    pub config: ReportSettings,
    pub stop_reason: StopReason,
    pub success_rate: f64,
    pub failed_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportDuration {
    pub ms: u64,
}

/// Settings the run was made with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSettings {
    /// RFC 3339 cutoff, or `"all"` in delete-all mode.
    pub max_date: String,
    pub test_mode: bool,
    pub protected_ids: Vec<String>,
}

impl RunReport {
    pub fn new(
        summary: &PassSummary,
        cutoff: Option<DateTime<Utc>>,
        test_mode: bool,
        protected_ids: Vec<String>,
        export_date: DateTime<Utc>,
    ) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            export_date,
            stats: summary.counters,
            duration: ReportDuration {
                ms: summary.elapsed.as_millis() as u64,
            },
            config: ReportSettings {
                max_date: cutoff
                    .map(|c| c.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_else(|| "all".to_string()),
                test_mode,
                protected_ids,
            },
            stop_reason: summary.stop_reason,
            success_rate: summary.success_rate,
            failed_ids: summary.failed_ids.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        report_file_name(self.export_date)
    }

    /// Write the report as pretty JSON into `dir`, creating it if needed.
    pub async fn export(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;

        let io_error = |source| ReportError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        tokio::fs::write(&path, json).await.map_err(io_error)?;

        tracing::info!(path = %path.display(), "Report exported");
        Ok(path)
    }
}

/// `postpurge-report-<timestamp>.json`, with `:` and `.` in the timestamp
/// replaced so the name is valid on every filesystem.
pub fn report_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("postpurge-report-{stamp}.json")
}

/// Human-readable end-of-run summary.
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub counters: CountersSnapshot,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl CompletionSummary {
    pub fn from_pass(summary: &PassSummary) -> Self {
        Self {
            counters: summary.counters,
            elapsed: summary.elapsed,
            stop_reason: summary.stop_reason,
        }
    }

    /// Deletions per minute over the whole run.
    pub fn speed_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.counters.deleted as f64 / minutes
        } else {
            0.0
        }
    }
}

pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

impl fmt::Display for CompletionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        writeln!(f, "Run {}", self.stop_reason)?;
        writeln!(f, "  Found:     {}", c.found)?;
        writeln!(f, "  To delete: {}", c.to_delete)?;
        writeln!(f, "  Deleted:   {}", c.deleted)?;
        writeln!(f, "  Skipped:   {}", c.skipped)?;
        writeln!(f, "  Protected: {}", c.protected)?;
        writeln!(f, "  Failed:    {}", c.failed)?;
        writeln!(f, "  Duration:  {}", format_duration(self.elapsed))?;
        write!(f, "  Speed:     {:.1} deletions/min", self.speed_per_minute())
    }
}
