//! analytics_stats tool implementation.
//!
//! Proxies the backend's aggregate counters. The request never passes
//! through the cache controller.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};

use docuclean_core::Error;

use crate::error::ServerError;
use crate::state::ServerState;

/// Implementation of the analytics_stats tool.
pub async fn stats_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let backend = state
        .backend
        .as_ref()
        .ok_or_else(|| ServerError::BackendUnavailable("no processing backend configured".into()))?;

    let stats = backend.stats().await.map_err(ServerError::from)?;
    let json = serde_json::to_string_pretty(&stats)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::state;

    #[tokio::test]
    async fn test_stats_without_backend() {
        let (state, _network) = state().await;
        let err = stats_impl(&state).await.unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode(-32010));
    }
}
