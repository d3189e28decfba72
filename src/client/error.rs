use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },
}

impl ClientError {
    /// Connection errors and timeouts, as opposed to request build failures.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ClientError::InvalidHeader { .. } => false,
        }
    }
}
