//! cache_keys tool implementation.
//!
//! Lists the request URLs stored in one cache generation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use docuclean_core::Error;

use crate::state::ServerState;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Cache generation to list. Defaults to the active one.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub cache_name: String,
    /// Stored request URLs, sorted.
    pub keys: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(state: &ServerState, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let (active, store) = {
        let registration = state.registration.lock().await;
        (registration.status().active, registration.store().clone())
    };

    let cache_name = params
        .cache_name
        .or(active)
        .ok_or_else(|| Error::CacheMiss("no active cache generation".into()))?;
    if !store.has_cache(&cache_name).await? {
        return Err(Error::CacheMiss(cache_name).into());
    }

    let keys = store.cache_keys(&cache_name).await?;
    let output = CacheKeysOutput { cache_name, keys };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{output, state};
    use crate::tools::worker::{WorkerInstallParams, install_impl};

    #[tokio::test]
    async fn test_keys_default_to_active_generation() {
        let (state, _network) = state().await;
        install_impl(&state, WorkerInstallParams::default()).await.unwrap();

        let out: CacheKeysOutput = output(&keys_impl(&state, CacheKeysParams::default()).await.unwrap());
        assert_eq!(out.cache_name, "docuclean-v1");
        assert_eq!(out.keys, vec!["http://localhost:8000/", "http://localhost:8000/static/script.js"]);
    }

    #[tokio::test]
    async fn test_keys_without_active_generation() {
        let (state, _network) = state().await;
        let err = keys_impl(&state, CacheKeysParams::default()).await.unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode(-32001));
    }

    #[tokio::test]
    async fn test_keys_unknown_cache() {
        let (state, _network) = state().await;
        install_impl(&state, WorkerInstallParams::default()).await.unwrap();

        let params = CacheKeysParams { cache_name: Some("docuclean-v0".into()) };
        assert!(keys_impl(&state, params).await.is_err());
    }
}
