use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lowest concurrency the pipeline will run with.
pub const MIN_CONCURRENCY: usize = 1;

/// Highest concurrency the pipeline will run with.
pub const MAX_CONCURRENCY: usize = 5;

/// Deletion pipeline pacing and failure limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletionConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay after every processed item, in milliseconds.
    #[serde(default = "default_delete_delay_ms")]
    pub delete_delay_ms: u64,

    /// Attempts per item before it is recorded as failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff after the first failed attempt, in milliseconds.
    /// Doubles after every further failed attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Random jitter applied to backoff delays (fraction, 0.0-1.0).
    #[serde(default)]
    pub jitter: f64,

    /// Minimum wait after a throttled response, in seconds.
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,

    /// The run is stopped once more than this many items have failed.
    #[serde(default = "default_max_failed")]
    pub max_failed: u64,

    /// Take a batch cooldown every N processed items.
    #[serde(default = "default_pause_every")]
    pub pause_every: u64,

    /// Length of the batch cooldown, in milliseconds.
    #[serde(default = "default_pause_duration_ms")]
    pub pause_duration_ms: u64,

    /// Simulate deletions without contacting the endpoint.
    #[serde(default)]
    pub test_mode: bool,

    /// Simulated latency per item in test mode, in milliseconds.
    #[serde(default = "default_test_delay_ms")]
    pub test_delay_ms: u64,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            delete_delay_ms: default_delete_delay_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter: 0.0,
            rate_limit_wait_secs: default_rate_limit_wait_secs(),
            max_failed: default_max_failed(),
            pause_every: default_pause_every(),
            pause_duration_ms: default_pause_duration_ms(),
            test_mode: false,
            test_delay_ms: default_test_delay_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_delete_delay_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_rate_limit_wait_secs() -> u64 {
    60
}

fn default_max_failed() -> u64 {
    20
}

fn default_pause_every() -> u64 {
    100
}

fn default_pause_duration_ms() -> u64 {
    2000
}

fn default_test_delay_ms() -> u64 {
    500
}

impl DeletionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(format!(
                "deletion.concurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            ));
        }
        if self.max_retries == 0 {
            return Err("deletion.max_retries must be at least 1".into());
        }
        if self.pause_every == 0 {
            return Err("deletion.pause_every must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!(
                "deletion.jitter must be between 0.0 and 1.0, got {}",
                self.jitter
            ));
        }
        Ok(())
    }

    /// Backoff to wait after failed attempt `attempt` (1-indexed):
    /// `backoff_base_ms * 2^(attempt - 1)`, plus jitter if configured.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let base_delay = (self.backoff_base_ms as f64) * 2f64.powi(exponent);

        let jitter_range = base_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (base_delay + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_millis(self.pause_duration_ms)
    }

    pub fn test_delay(&self) -> Duration {
        Duration::from_millis(self.test_delay_ms)
    }

    pub fn rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit_wait_secs)
    }
}
