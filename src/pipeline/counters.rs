use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selection::SelectionOutcome;

/// Live counters for one run.
///
/// Fields are independent atomics, so a snapshot taken while workers are
/// running may mix values from adjacent updates.
#[derive(Debug)]
pub struct RunCounters {
    found: AtomicU64,
    to_delete: AtomicU64,
    deleted: AtomicU64,
    skipped: AtomicU64,
    protected: AtomicU64,
    failed: AtomicU64,
    started_at: DateTime<Utc>,
}

impl RunCounters {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            found: AtomicU64::new(0),
            to_delete: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            protected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started_at,
        }
    }

    /// Counters seeded from a selection result.
    pub fn from_selection(outcome: &SelectionOutcome, started_at: DateTime<Utc>) -> Self {
        let counters = Self::new(started_at);
        counters
            .found
            .store(outcome.total() as u64, Ordering::Relaxed);
        counters
            .to_delete
            .store(outcome.eligible.len() as u64, Ordering::Relaxed);
        counters
            .skipped
            .store(outcome.skipped.len() as u64, Ordering::Relaxed);
        counters
            .protected
            .store(outcome.protected.len() as u64, Ordering::Relaxed);
        counters
    }

    /// Returns the new deleted count.
    pub fn record_deleted(&self) -> u64 {
        self.deleted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the new failed count.
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            found: self.found.load(Ordering::Relaxed),
            to_delete: self.to_delete.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::Relaxed),
            protected: self.protected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::SeqCst),
            started_at: self.started_at,
        }
    }
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub found: u64,
    pub to_delete: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub protected: u64,
    pub failed: u64,
    pub started_at: DateTime<Utc>,
}

impl CountersSnapshot {
    /// Items with a terminal outcome so far.
    pub fn processed(&self) -> u64 {
        self.deleted + self.failed
    }

    /// Completed fraction of the items to delete, 0.0-1.0.
    pub fn progress(&self) -> f64 {
        if self.to_delete == 0 {
            1.0
        } else {
            (self.processed() as f64 / self.to_delete as f64).min(1.0)
        }
    }
}
