//! Configuration for postpurge.
//!
//! The tool is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Session cookies should
//! always come from the environment rather than being written to disk.
//!
//! # Example
//!
//! ```toml
//! [session]
//! cookie = "${POSTPURGE_COOKIE}"
//!
//! [selection]
//! before = "2023-01-01"
//! protected_ids = ["1234567890"]
//!
//! [deletion]
//! concurrency = 3
//! ```

mod deletion;
mod observability;
mod selection;
mod session;
mod state;

use std::path::Path;

pub use deletion::*;
pub use observability::*;
pub use selection::*;
use serde::{Deserialize, Serialize};
pub use session::*;
pub use state::*;

/// Root configuration.
///
/// Every section is optional. A file containing only `[session]` is enough
/// to run against the live endpoint with the default pacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    /// Browser session credentials.
    #[serde(default)]
    pub session: SessionConfig,

    /// Remote deletion endpoint.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Which records are selected for deletion.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Pacing, retry and failure limits for the deletion pipeline.
    #[serde(default)]
    pub deletion: DeletionConfig,

    /// Archive loading limits.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Where the failed-item ledger is persisted between runs.
    #[serde(default)]
    pub state: StateConfig,

    /// Run report export.
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PurgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let mut config: PurgeConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.endpoint.validate().map_err(ConfigError::Validation)?;
        self.selection.validate().map_err(ConfigError::Validation)?;
        self.deletion.validate().map_err(ConfigError::Validation)?;
        self.archive.validate().map_err(ConfigError::Validation)?;

        if self.deletion.test_mode {
            tracing::info!("Test mode enabled, no deletion requests will be sent");
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    static ENV_VAR: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
    });
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
