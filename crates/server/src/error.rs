//! Structured errors for the docuclean server.
//!
//! Cache and lifecycle failures already map through `docuclean_core::Error`;
//! this covers what only the server surface produces.

use docuclean_client::BackendError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid input parameters (e.g., an empty message).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No processing backend is configured.
    #[error("BACKEND_UNAVAILABLE: {0}")]
    BackendUnavailable(String),

    /// The processing backend answered with an error or could not be reached.
    #[error("BACKEND_ERROR: {0}")]
    Backend(#[from] BackendError),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let code = match &err {
            ServerError::InvalidInput(_) => -32602,
            ServerError::BackendUnavailable(_) => -32010,
            ServerError::Backend(_) => -32011,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
