//! Shared fixtures for the end-to-end tests.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path_regex},
};

use crate::{
    client::GraphqlClient,
    config::{DeletionConfig, EndpointConfig, PurgeConfig, SessionConfig},
    pipeline::{CountersSnapshot, DeletionPipeline, ProgressObserver, RunControl},
    session::Credentials,
};

pub const TEST_COOKIE: &str = "auth_token=test-auth; ct0=test-csrf";

struct SequentialResponderState {
    responses: Vec<ResponseTemplate>,
    call_count: AtomicUsize,
}

/// Returns the configured responses in order, then repeats the last one.
///
/// Clone it before mounting to read the call count afterwards.
#[derive(Clone)]
pub struct SequentialResponder {
    state: Arc<SequentialResponderState>,
}

impl SequentialResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(
            !responses.is_empty(),
            "SequentialResponder requires at least one response"
        );
        Self {
            state: Arc::new(SequentialResponderState {
                responses,
                call_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Every call answers with `status`.
    pub fn always(status: u16) -> Self {
        Self::new(vec![ResponseTemplate::new(status)])
    }

    /// One response per status code, in order.
    pub fn statuses(statuses: &[u16]) -> Self {
        Self::new(statuses.iter().map(|s| ResponseTemplate::new(*s)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.state.call_count.load(Ordering::SeqCst)
    }
}

impl wiremock::Respond for SequentialResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let count = self.state.call_count.fetch_add(1, Ordering::SeqCst);
        let idx = count.min(self.state.responses.len() - 1);
        self.state.responses[idx].clone()
    }
}

/// Pacing fast enough for tests; backoff stays non-zero so its path runs.
pub fn fast_deletion() -> DeletionConfig {
    DeletionConfig {
        concurrency: 2,
        delete_delay_ms: 1,
        max_retries: 3,
        backoff_base_ms: 5,
        rate_limit_wait_secs: 0,
        pause_duration_ms: 0,
        test_delay_ms: 1,
        ..Default::default()
    }
}

/// Mock endpoint plus a configuration pointing at it.
pub struct DeletionHarness {
    pub server: MockServer,
    pub config: PurgeConfig,
}

impl DeletionHarness {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let config = PurgeConfig {
            session: SessionConfig {
                cookie: Some(TEST_COOKIE.to_string()),
                ..Default::default()
            },
            endpoint: EndpointConfig {
                base_url: server.uri(),
                timeout_secs: 5,
                ..Default::default()
            },
            deletion: fast_deletion(),
            ..Default::default()
        };
        Self { server, config }
    }

    /// Answer every deletion request with `responder`.
    pub async fn mount(&self, responder: &SequentialResponder) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/i/api/graphql/[^/]+/DeleteTweet$"))
            .respond_with(responder.clone())
            .mount(&self.server)
            .await;
    }

    pub fn client(&self) -> Arc<GraphqlClient> {
        let credentials = Credentials::from_config(&self.config.session).unwrap();
        Arc::new(GraphqlClient::new(&self.config.endpoint, &credentials).unwrap())
    }

    pub fn pipeline(&self, control: RunControl) -> DeletionPipeline {
        DeletionPipeline::new(self.client(), self.config.deletion.clone(), control)
    }

    /// `tweet_id` of every request received, in arrival order.
    pub async fn requested_ids(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.body_json::<serde_json::Value>().ok())
            .filter_map(|body| body["variables"]["tweet_id"].as_str().map(String::from))
            .collect()
    }
}

/// Keeps every status message and counts progress callbacks.
#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<CountersSnapshot>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, snapshot: &CountersSnapshot) {
        self.updates.lock().push(*snapshot);
    }

    fn on_status(&self, message: &str) {
        self.statuses.lock().push(message.to_string());
    }
}

/// Write an archive in the export's `window.YTD.tweets.part0` form.
pub fn write_archive(dir: &Path, posts: &[(&str, DateTime<Utc>)]) -> PathBuf {
    let entries: Vec<_> = posts
        .iter()
        .map(|(id, created_at)| {
            json!({
                "tweet": {
                    "id_str": id,
                    "created_at": created_at.format("%a %b %d %H:%M:%S %z %Y").to_string(),
                    "full_text": format!("post {id}"),
                }
            })
        })
        .collect();

    let path = dir.join("tweets.js");
    let body = serde_json::to_string_pretty(&entries).unwrap();
    std::fs::write(&path, format!("window.YTD.tweets.part0 = {body}")).unwrap();
    path
}
