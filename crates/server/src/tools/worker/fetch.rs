//! worker_fetch tool implementation.
//!
//! Issues a request the way a controlled page would: through the active
//! version's cache controller, or straight to the network without one.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use docuclean_client::fetch::resolve;
use docuclean_core::registration::dispatch_fetch;
use docuclean_core::{Error, FetchEvent, Request, RequestMode, ResponseSource};

use crate::state::ServerState;

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path relative to the controlled origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode; `navigate` is a top-level page load.
    #[serde(default)]
    pub mode: RequestMode,

    /// Wait for background cache revalidation before returning.
    #[serde(default)]
    pub wait_for_revalidation: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// Final response URL.
    pub url: String,
    pub status: u16,
    /// Whether the response came from the network, the cache or the offline fallback.
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub bytes: usize,
    /// Body as text, if it is valid UTF-8.
    pub body: Option<String>,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(state: &ServerState, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let method = params.method.trim();
    if method.is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }
    let url = resolve(&state.deploy.origin, &params.url).map_err(Error::from)?;
    let request = Request::new(method, url, params.mode);

    let (controller, network) = {
        let registration = state.registration.lock().await;
        (registration.active_controller(), registration.network())
    };

    let mut event = FetchEvent::new(request);
    let handled = dispatch_fetch(controller, network.as_ref(), &mut event).await?;
    if params.wait_for_revalidation {
        event.settle().await;
    }

    let response = handled.response;
    let output = WorkerFetchOutput {
        url: response.url.to_string(),
        status: response.status,
        source: handled.source,
        content_type: response.content_type.clone(),
        bytes: response.body.len(),
        body: std::str::from_utf8(&response.body).ok().map(String::from),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
