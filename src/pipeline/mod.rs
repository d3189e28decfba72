//! Bounded-concurrency deletion pipeline.
//!
//! A pass drains an ordered list of records with `C` workers. Workers claim
//! items from a shared cursor, so every item is attempted by exactly one
//! worker and reaches exactly one terminal outcome: deleted or failed.
//!
//! Per item a worker:
//!
//! 1. calls the [`DeletionClient`] up to `max_retries` times, backing off
//!    `backoff_base_ms * 2^(k-1)` after failed attempt `k`;
//! 2. on a throttled response, waits on the shared [`RateLimitCoordinator`]
//!    before spending its next attempt;
//! 3. records the outcome, sleeps the inter-item delay, and takes a batch
//!    cooldown every `pause_every` processed items.
//!
//! The pass ends when the cursor is exhausted or the [`RunControl`] is
//! stopped, either by the user or by the failure ceiling.

mod control;
mod counters;
mod observer;
mod rate_limit;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

pub use control::RunControl;
pub use counters::{CountersSnapshot, RunCounters};
use futures::future::join_all;
pub use observer::{NoopObserver, ProgressObserver, TracingObserver};
use parking_lot::Mutex;
pub use rate_limit::RateLimitCoordinator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    archive::Record,
    client::{DeleteOutcome, DeletionClient},
    config::{DeletionConfig, MAX_CONCURRENCY, MIN_CONCURRENCY},
};

/// Why a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every item was attempted.
    Completed,
    /// Stopped on request before every item was attempted.
    Stopped,
    /// More items failed than the configured ceiling allows.
    FailureCeiling,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::FailureCeiling => write!(f, "failure ceiling reached"),
        }
    }
}

/// Result of one pipeline pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub counters: CountersSnapshot,
    pub success_rate: f64,
    /// Concurrency recommended for a following pass.
    pub next_concurrency: usize,
    pub stop_reason: StopReason,
    /// Ids whose retries were exhausted, in completion order.
    pub failed_ids: Vec<String>,
    /// Ids never attempted because the pass stopped early, in input order.
    pub remaining_ids: Vec<String>,
    pub elapsed: Duration,
}

/// `deleted / (deleted + failed)`, or 1.0 when nothing was attempted.
pub fn success_rate(deleted: u64, failed: u64) -> f64 {
    let attempted = deleted + failed;
    if attempted == 0 {
        1.0
    } else {
        deleted as f64 / attempted as f64
    }
}

/// Scale `current` by the success rate, clamped to the supported range.
pub fn next_concurrency(current: usize, success_rate: f64) -> usize {
    let scaled = (current as f64 * success_rate).round();
    (scaled.max(0.0) as usize).clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// State shared by the workers of one pass.
struct Pass<'a> {
    records: &'a [Record],
    counters: &'a RunCounters,
    cursor: AtomicUsize,
    processed: AtomicU64,
    failed_ids: Mutex<Vec<String>>,
    ceiling_hit: AtomicBool,
}

pub struct DeletionPipeline {
    client: Arc<dyn DeletionClient>,
    config: DeletionConfig,
    control: RunControl,
    rate_limit: Arc<RateLimitCoordinator>,
    observer: Arc<dyn ProgressObserver>,
}

impl DeletionPipeline {
    pub fn new(client: Arc<dyn DeletionClient>, config: DeletionConfig, control: RunControl) -> Self {
        let rate_limit = Arc::new(RateLimitCoordinator::new(config.rate_limit_wait()));
        Self {
            client,
            config,
            control,
            rate_limit,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimitCoordinator> {
        &self.rate_limit
    }

    /// Attempt to delete every record once, with `concurrency` workers.
    ///
    /// `counters` should already carry the selection totals; this pass only
    /// adds to `deleted` and `failed`.
    pub async fn run(
        &self,
        records: &[Record],
        counters: &RunCounters,
        concurrency: usize,
    ) -> PassSummary {
        let concurrency = concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        let started = Instant::now();
        let pass = Pass {
            records,
            counters,
            cursor: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            failed_ids: Mutex::new(Vec::new()),
            ceiling_hit: AtomicBool::new(false),
        };

        info!(
            items = records.len(),
            concurrency,
            test_mode = self.config.test_mode,
            "Starting deletion pass"
        );

        let workers = (0..concurrency.min(records.len().max(1)))
            .map(|worker| self.worker(worker, &pass));
        join_all(workers).await;

        let snapshot = counters.snapshot();
        if snapshot.failed > self.config.max_failed && !pass.ceiling_hit.load(Ordering::SeqCst) {
            pass.ceiling_hit.store(true, Ordering::SeqCst);
            self.trip_ceiling(snapshot.failed);
        }

        // Claims are handed out in order, so everything past the cursor was
        // never attempted.
        let claimed = pass.cursor.load(Ordering::SeqCst).min(records.len());
        let remaining_ids: Vec<String> =
            records[claimed..].iter().map(|r| r.id.clone()).collect();

        let stop_reason = if pass.ceiling_hit.load(Ordering::SeqCst) {
            StopReason::FailureCeiling
        } else if !remaining_ids.is_empty() {
            StopReason::Stopped
        } else {
            StopReason::Completed
        };

        let success_rate = success_rate(snapshot.deleted, snapshot.failed);
        let summary = PassSummary {
            counters: snapshot,
            success_rate,
            next_concurrency: next_concurrency(concurrency, success_rate),
            stop_reason,
            failed_ids: pass.failed_ids.into_inner(),
            remaining_ids,
            elapsed: started.elapsed(),
        };

        info!(
            deleted = summary.counters.deleted,
            failed = summary.counters.failed,
            success_rate = summary.success_rate,
            next_concurrency = summary.next_concurrency,
            reason = %summary.stop_reason,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Deletion pass finished"
        );

        summary
    }

    async fn worker(&self, worker: usize, pass: &Pass<'_>) {
        debug!(worker, "Worker started");

        loop {
            self.control.wait_while_paused().await;
            if self.control.is_stopped() {
                break;
            }

            let index = pass.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(record) = pass.records.get(index) else {
                break;
            };

            if self.delete_with_retry(worker, record).await {
                pass.counters.record_deleted();
            } else {
                let failed = pass.counters.record_failed();
                pass.failed_ids.lock().push(record.id.clone());
                if failed > self.config.max_failed && !pass.ceiling_hit.swap(true, Ordering::SeqCst)
                {
                    self.trip_ceiling(failed);
                }
            }
            self.observer.on_progress(&pass.counters.snapshot());

            tokio::time::sleep(self.config.delete_delay()).await;

            let processed = pass.processed.fetch_add(1, Ordering::SeqCst) + 1;
            if processed % self.config.pause_every.max(1) == 0 && !self.control.is_stopped() {
                self.observer.on_status(&format!(
                    "Processed {processed} items, pausing {}ms",
                    self.config.pause_duration_ms
                ));
                tokio::time::sleep(self.config.pause_duration()).await;
            }
        }

        debug!(worker, "Worker finished");
    }

    fn trip_ceiling(&self, failed: u64) {
        warn!(
            failed,
            max_failed = self.config.max_failed,
            "Too many failures, stopping run"
        );
        self.observer
            .on_status(&format!("Stopped: {failed} items failed"));
        self.control.stop();
    }

    /// Returns `true` if the item ended up deleted (or already gone).
    async fn delete_with_retry(&self, worker: usize, record: &Record) -> bool {
        let max_attempts = self.config.max_retries.max(1);
        let id = record.id.as_str();

        for attempt in 1..=max_attempts {
            match self.client.delete(id).await {
                Ok(response) => {
                    if let Some(reset) = response.rate_limit_reset {
                        self.rate_limit.observe_reset(reset);
                    }

                    match response.outcome {
                        DeleteOutcome::Deleted | DeleteOutcome::AlreadyGone => {
                            if attempt > 1 {
                                debug!(worker, id, attempt, "Deleted after retry");
                            }
                            return true;
                        }
                        DeleteOutcome::Throttled => {
                            warn!(worker, id, attempt, max_attempts, "Throttled by remote");
                            self.observer.on_status("Rate limited, waiting");
                            if !self.rate_limit.wait(&self.control).await {
                                debug!(worker, id, "Stopped during rate-limit wait");
                                return false;
                            }
                        }
                        DeleteOutcome::Rejected { status } => {
                            warn!(worker, id, status, attempt, max_attempts, "Deletion rejected");
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        worker,
                        id,
                        error = %error,
                        transient = error.is_transient(),
                        attempt,
                        max_attempts,
                        "Deletion request failed"
                    );
                }
            }

            if attempt < max_attempts {
                let delay = self.config.backoff_for_attempt(attempt);
                debug!(worker, id, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }
        }

        warn!(worker, id, attempts = max_attempts, "Deletion failed after all attempts");
        false
    }
}
