//! The remote deletion operation.
//!
//! [`DeletionClient`] is the seam between the pipeline and the network. The
//! pipeline only needs to know how a single attempt ended; retries, backoff
//! and throttling are handled by the caller.

mod error;
mod graphql;
mod simulated;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;

pub use error::ClientError;
pub use graphql::GraphqlClient;
pub use simulated::SimulatedClient;

/// Header advertising when the current rate-limit window resets (Unix seconds).
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// How one deletion attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// 200: the post was deleted.
    Deleted,
    /// 404: the post no longer exists.
    AlreadyGone,
    /// 429: the caller must slow down before retrying.
    Throttled,
    /// Any other status.
    Rejected { status: u16 },
}

impl DeleteOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => DeleteOutcome::Deleted,
            404 => DeleteOutcome::AlreadyGone,
            429 => DeleteOutcome::Throttled,
            status => DeleteOutcome::Rejected { status },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted | DeleteOutcome::AlreadyGone)
    }
}

/// Result of one attempt, including any advertised rate-limit reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResponse {
    pub outcome: DeleteOutcome,
    pub rate_limit_reset: Option<DateTime<Utc>>,
}

impl DeleteResponse {
    pub fn new(outcome: DeleteOutcome) -> Self {
        Self {
            outcome,
            rate_limit_reset: None,
        }
    }

    pub fn with_reset(mut self, reset: DateTime<Utc>) -> Self {
        self.rate_limit_reset = Some(reset);
        self
    }
}

/// Performs a single deletion attempt.
#[async_trait]
pub trait DeletionClient: Send + Sync {
    /// Attempt to delete the post with the given id.
    ///
    /// Transport failures are returned as errors; every HTTP response,
    /// including error statuses, is an `Ok` with the matching outcome.
    async fn delete(&self, id: &str) -> Result<DeleteResponse, ClientError>;
}

/// Read the rate-limit reset instant from response headers.
pub fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let secs: i64 = headers
        .get(RATE_LIMIT_RESET_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    DateTime::from_timestamp(secs, 0)
}
