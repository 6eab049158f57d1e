//! cache_status tool implementation.
//!
//! Reports the registration, every cache generation on disk and the
//! background revalidation counters of the active version.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use docuclean_core::cache::CacheSummary;
use docuclean_core::controller::RevalidationCounts;
use docuclean_core::registration::RegistrationStatus;
use docuclean_core::Error;

use crate::state::ServerState;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub registration: RegistrationStatus,
    /// Cache generations, oldest first.
    pub caches: Vec<CacheSummary>,
    /// Revalidation counters of the active version, if one is active.
    pub revalidation: Option<RevalidationCounts>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let (registration, revalidation, store) = {
        let registration = state.registration.lock().await;
        (
            registration.status(),
            registration.active_controller().map(|c| c.revalidation()),
            registration.store().clone(),
        )
    };
    let caches = store.cache_summaries().await?;

    let output = CacheStatusOutput { registration, caches, revalidation };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
