//! Shared cooldown after throttled responses.
//!
//! Any worker may record the reset instant the remote advertises; the last
//! write wins. A worker that is throttled waits for the longer of the
//! configured base wait and the time left until that instant.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::RunControl;

const WAIT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimitCoordinator {
    reset_at: Mutex<Option<DateTime<Utc>>>,
    base_wait: Duration,
    waits: AtomicU64,
}

impl RateLimitCoordinator {
    pub fn new(base_wait: Duration) -> Self {
        Self {
            reset_at: Mutex::new(None),
            base_wait,
            waits: AtomicU64::new(0),
        }
    }

    /// Record the reset instant advertised by the remote.
    pub fn observe_reset(&self, reset_at: DateTime<Utc>) {
        *self.reset_at.lock() = Some(reset_at);
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        *self.reset_at.lock()
    }

    /// How long a throttled worker should wait at `now`.
    pub fn wait_duration(&self, now: DateTime<Utc>) -> Duration {
        let until_reset = self
            .reset_at()
            .and_then(|reset| (reset - now).to_std().ok())
            .unwrap_or_default();
        self.base_wait.max(until_reset)
    }

    /// Number of throttle waits started so far.
    pub fn waits_observed(&self) -> u64 {
        self.waits.load(Ordering::SeqCst)
    }

    /// Block the calling worker for [`wait_duration`](Self::wait_duration).
    ///
    /// Returns `false` if the run was stopped before the wait finished.
    pub async fn wait(&self, control: &RunControl) -> bool {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.wait_duration(Utc::now());

        tracing::info!(wait_secs = remaining.as_secs(), "Rate limited, waiting");

        while !remaining.is_zero() {
            if control.is_stopped() {
                return false;
            }
            let step = remaining.min(WAIT_TICK);
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = control.stopped() => return false,
            }
            remaining = remaining.saturating_sub(step);
        }

        !control.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_wait_duration_uses_base_without_reset() {
        let limiter = RateLimitCoordinator::new(Duration::from_secs(60));
        assert_eq!(limiter.wait_duration(Utc::now()), Duration::from_secs(60));
    }

    #[test]
    fn test_wait_duration_takes_later_reset() {
        let limiter = RateLimitCoordinator::new(Duration::from_secs(60));
        let now = Utc::now();

        limiter.observe_reset(now + TimeDelta::seconds(300));
        assert_eq!(limiter.wait_duration(now), Duration::from_secs(300));

        // Last write wins, even if earlier.
        limiter.observe_reset(now + TimeDelta::seconds(10));
        assert_eq!(limiter.wait_duration(now), Duration::from_secs(60));

        limiter.observe_reset(now - TimeDelta::seconds(10));
        assert_eq!(limiter.wait_duration(now), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes() {
        let limiter = RateLimitCoordinator::new(Duration::from_secs(3));
        let control = RunControl::new();
        let started = tokio::time::Instant::now();

        assert!(limiter.wait(&control).await);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(limiter.waits_observed(), 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_wait() {
        let limiter = RateLimitCoordinator::new(Duration::from_secs(60));
        let control = RunControl::new();

        let stopper = {
            let control = control.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                control.stop();
            })
        };

        let completed = tokio::time::timeout(Duration::from_secs(2), limiter.wait(&control))
            .await
            .expect("stop should interrupt the wait");
        assert!(!completed);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_wait_returns_immediately() {
        let limiter = RateLimitCoordinator::new(Duration::ZERO);
        assert!(limiter.wait(&RunControl::new()).await);
    }
}
