use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Stop signal and pause gate shared by every worker of a run.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(paused),
        }
    }

    /// Request a stop. Also lifts any pause so idle workers can exit.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.paused.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }

    pub fn pause(&self) {
        if !self.is_stopped() {
            self.paused.send_replace(true);
        }
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Flip the pause state; returns `true` if now paused.
    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume();
            false
        } else {
            self.pause();
            self.is_paused()
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Wait until the run is not paused, or has been stopped.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.paused.subscribe();
        loop {
            if !*rx.borrow_and_update() || self.is_stopped() {
                return;
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = self.cancel.cancelled() => return,
            }
        }
    }
}
