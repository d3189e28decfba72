use serde::{Deserialize, Serialize};

/// Browser session credentials.
///
/// The `cookie` value is the full `Cookie` header of a logged-in browser
/// session. The CSRF token is read from its `ct0` entry unless
/// `csrf_token` overrides it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default)]
    pub cookie: Option<String>,

    #[serde(default)]
    pub csrf_token: Option<String>,

    /// Bearer token sent in `authorization`. Defaults to the public web
    /// client token.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Remote GraphQL endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// GraphQL operation id of the delete mutation.
    #[serde(default = "default_query_id")]
    pub query_id: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            query_id: default_query_id(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_base_url() -> String {
    "https://x.com".to_string()
}

fn default_query_id() -> String {
    "VaenaVgh5q5ih7kvyVjgtg".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| format!("endpoint.base_url '{}' is not a valid URL: {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "endpoint.base_url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.query_id.trim().is_empty() {
            return Err("endpoint.query_id must not be empty".into());
        }
        if self.timeout_secs == 0 {
            return Err("endpoint.timeout_secs must be at least 1".into());
        }
        Ok(())
    }

    /// Full URL of the delete mutation.
    pub fn delete_url(&self) -> String {
        format!(
            "{}/i/api/graphql/{}/DeleteTweet",
            self.base_url.trim_end_matches('/'),
            self.query_id
        )
    }
}
