use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, header};
use serde_json::json;

use super::{ClientError, DeleteOutcome, DeleteResponse, DeletionClient, parse_rate_limit_reset};
use crate::{config::EndpointConfig, session::Credentials};

/// Longest response body excerpt written to debug logs.
const MAX_LOGGED_BODY: usize = 512;

/// Deletes posts through the web client's GraphQL mutation.
#[derive(Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    url: String,
    query_id: String,
    headers: HeaderMap,
}

impl GraphqlClient {
    pub fn new(endpoint: &EndpointConfig, credentials: &Credentials) -> Result<Self, ClientError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(endpoint.timeout_secs));
        if let Some(user_agent) = endpoint.user_agent.as_deref() {
            builder = builder.user_agent(user_agent);
        }
        let http = builder.build()?;
        Self::with_http(http, endpoint, credentials)
    }

    /// Build on an existing HTTP client.
    pub fn with_http(
        http: reqwest::Client,
        endpoint: &EndpointConfig,
        credentials: &Credentials,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            url: endpoint.delete_url(),
            query_id: endpoint.query_id.clone(),
            headers: session_headers(credentials)?,
        })
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ClientError> {
    let mut value = HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader { name })?;
    value.set_sensitive(true);
    Ok(value)
}

fn session_headers(credentials: &Credentials) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        header::AUTHORIZATION,
        header_value("authorization", &credentials.authorization)?,
    );
    headers.insert(header::COOKIE, header_value("cookie", &credentials.cookie)?);
    headers.insert(
        "x-csrf-token",
        header_value("x-csrf-token", &credentials.csrf_token)?,
    );
    headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));
    headers.insert(
        "x-twitter-auth-type",
        HeaderValue::from_static("OAuth2Session"),
    );
    Ok(headers)
}

#[async_trait]
impl DeletionClient for GraphqlClient {
    async fn delete(&self, id: &str) -> Result<DeleteResponse, ClientError> {
        let body = json!({
            "variables": {
                "tweet_id": id,
                "dark_request": false,
            },
            "queryId": self.query_id,
        });

        let response = self
            .http
            .post(&self.url)
            .headers(self.headers.clone())
            .header("x-client-transaction-id", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let reset = parse_rate_limit_reset(response.headers());
        let outcome = DeleteOutcome::from_status(status);

        if !outcome.is_success() {
            // Best effort; the body is only used for diagnostics.
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(MAX_LOGGED_BODY).collect();
            tracing::debug!(id, status, body = %excerpt, "Deletion request not accepted");
        }

        let mut result = DeleteResponse::new(outcome);
        if let Some(reset) = reset {
            result = result.with_reset(reset);
        }
        Ok(result)
    }
}
