use super::CountersSnapshot;

/// Receives progress from a running pipeline.
///
/// Called from worker futures, so implementations must not block.
pub trait ProgressObserver: Send + Sync {
    /// Called after every item reaches a terminal outcome.
    fn on_progress(&self, snapshot: &CountersSnapshot);

    /// Free-form status changes (throttling, batch pauses, stops).
    fn on_status(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _snapshot: &CountersSnapshot) {}

    fn on_status(&self, _message: &str) {}
}

/// Writes progress to the tracing subscriber: every item at debug, and a
/// summary line every `every` items at info.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    every: u64,
}

impl TracingObserver {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(25)
    }
}

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, snapshot: &CountersSnapshot) {
        let processed = snapshot.processed();
        tracing::debug!(
            deleted = snapshot.deleted,
            failed = snapshot.failed,
            to_delete = snapshot.to_delete,
            "Progress"
        );
        if processed % self.every == 0 || processed == snapshot.to_delete {
            tracing::info!(
                deleted = snapshot.deleted,
                failed = snapshot.failed,
                remaining = snapshot.to_delete.saturating_sub(processed),
                percent = %format!("{:.1}", snapshot.progress() * 100.0),
                "Deletion progress"
            );
        }
    }

    fn on_status(&self, message: &str) {
        tracing::info!("{message}");
    }
}
