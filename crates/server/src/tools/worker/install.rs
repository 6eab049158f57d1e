//! worker_install, worker_message and worker_release_clients.
//!
//! The lifecycle events a page or browser would send to the registration.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use docuclean_core::registration::RegistrationStatus;
use docuclean_core::{Error, WorkerState};

use crate::error::ServerError;
use crate::state::ServerState;

/// Parameters for the worker_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallParams {
    /// Cache generation to deploy. Defaults to the configured version.
    #[serde(default)]
    pub cache_version: Option<String>,

    /// Activate as soon as install completes instead of waiting for
    /// controlled pages to close. Defaults to the configured behaviour.
    #[serde(default)]
    pub skip_waiting: Option<bool>,
}

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message body as a page would post it, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

/// Output shared by the lifecycle tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerLifecycleOutput {
    /// State of the version the event acted on, if any.
    pub state: Option<WorkerState>,
    pub registration: RegistrationStatus,
}

fn lifecycle_result(state: Option<WorkerState>, status: RegistrationStatus) -> Result<CallToolResult, McpError> {
    let output = WorkerLifecycleOutput { state, registration: status };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Install a new worker version and activate it if nothing blocks it.
pub async fn install_impl(state: &ServerState, params: WorkerInstallParams) -> Result<CallToolResult, McpError> {
    let mut config = state.deploy.clone();
    if let Some(version) = params.cache_version {
        let version = version.trim();
        if version.is_empty() {
            return Err(ServerError::InvalidInput("cache_version cannot be empty".into()).into());
        }
        config.generation = version.to_string();
    }
    if let Some(skip_waiting) = params.skip_waiting {
        config.skip_waiting_on_install = skip_waiting;
    }

    let mut registration = state.registration.lock().await;
    let installed = registration.register(config).await?;
    lifecycle_result(Some(installed), registration.status())
}

/// Post a control message to the waiting version.
pub async fn message_impl(state: &ServerState, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    if !params.message.is_object() {
        return Err(ServerError::InvalidInput("message must be a JSON object".into()).into());
    }

    let mut registration = state.registration.lock().await;
    let activated = registration.post_message(&params.message).await?;
    lifecycle_result(activated, registration.status())
}

/// Report that every controlled page has closed.
pub async fn release_clients_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let mut registration = state.registration.lock().await;
    let activated = registration.release_clients().await?;
    lifecycle_result(activated, registration.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{output, state};
    use serde_json::json;

    #[tokio::test]
    async fn test_first_install_activates() {
        let (state, _network) = state().await;

        let result = install_impl(&state, WorkerInstallParams::default()).await.unwrap();
        let out: WorkerLifecycleOutput = output(&result);
        assert_eq!(out.state, Some(WorkerState::Active));
        assert_eq!(out.registration.active.as_deref(), Some("docuclean-v1"));
        assert!(out.registration.clients_claimed);
    }

    #[tokio::test]
    async fn test_update_waits_then_skip_waiting_message_activates() {
        let (state, _network) = state().await;
        install_impl(&state, WorkerInstallParams::default()).await.unwrap();

        let params = WorkerInstallParams { cache_version: Some("docuclean-v2".into()), skip_waiting: Some(false) };
        let out: WorkerLifecycleOutput = output(&install_impl(&state, params).await.unwrap());
        assert_eq!(out.state, Some(WorkerState::Waiting));
        assert_eq!(out.registration.active.as_deref(), Some("docuclean-v1"));
        assert_eq!(out.registration.waiting.as_deref(), Some("docuclean-v2"));

        let params = WorkerMessageParams { message: json!({"type": "SKIP_WAITING"}) };
        let out: WorkerLifecycleOutput = output(&message_impl(&state, params).await.unwrap());
        assert_eq!(out.state, Some(WorkerState::Active));
        assert_eq!(out.registration.active.as_deref(), Some("docuclean-v2"));
        assert_eq!(out.registration.waiting, None);

        let registration = state.registration.lock().await;
        assert_eq!(registration.store().cache_names().await.unwrap(), vec!["docuclean-v2"]);
    }

    #[tokio::test]
    async fn test_release_clients_activates_waiting_version() {
        let (state, _network) = state().await;
        install_impl(&state, WorkerInstallParams::default()).await.unwrap();
        let params = WorkerInstallParams { cache_version: Some("docuclean-v2".into()), skip_waiting: Some(false) };
        install_impl(&state, params).await.unwrap();

        let out: WorkerLifecycleOutput = output(&release_clients_impl(&state).await.unwrap());
        assert_eq!(out.state, Some(WorkerState::Active));
        assert_eq!(out.registration.active.as_deref(), Some("docuclean-v2"));

        let out: WorkerLifecycleOutput = output(&release_clients_impl(&state).await.unwrap());
        assert_eq!(out.state, None);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_version() {
        let (state, network) = state().await;
        install_impl(&state, WorkerInstallParams::default()).await.unwrap();

        network.fail("/static/script.js");
        let params = WorkerInstallParams { cache_version: Some("docuclean-v2".into()), skip_waiting: Some(true) };
        let err = install_impl(&state, params).await.unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode(-32009));
        assert!(err.message.contains("/static/script.js"));

        let registration = state.registration.lock().await;
        assert_eq!(registration.status().active.as_deref(), Some("docuclean-v1"));
        assert!(!registration.store().has_cache("docuclean-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_message_rejected() {
        let (state, _network) = state().await;

        let params = WorkerMessageParams { message: json!({"type": "CLAIM"}) };
        assert!(message_impl(&state, params).await.is_err());

        let params = WorkerMessageParams { message: json!("SKIP_WAITING") };
        let err = message_impl(&state, params).await.unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode(-32602));
    }

    #[tokio::test]
    async fn test_empty_cache_version_rejected() {
        let (state, network) = state().await;
        let params = WorkerInstallParams { cache_version: Some("  ".into()), skip_waiting: None };
        assert!(install_impl(&state, params).await.is_err());
        assert!(network.calls().is_empty());
    }
}
