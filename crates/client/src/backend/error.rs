//! Processing backend client error types.

use std::sync::Arc;

/// Errors from the processing backend client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Invalid request built by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Base URL or endpoint could not be formed.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Backend answered with an error status.
    #[error("HTTP error {status}: {detail}")]
    Http { status: u16, detail: String },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BackendError::Timeout } else { BackendError::Network(Arc::new(err)) }
    }
}

impl BackendError {
    /// Whether a later retry could succeed without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Network(_) => true,
            BackendError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
