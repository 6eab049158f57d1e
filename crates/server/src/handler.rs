//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::ServerState;
use crate::tools::{
    CacheKeysParams, WorkerFetchParams, WorkerInstallParams, WorkerMessageParams, analytics, fetch_impl,
    install_impl, keys_impl, message_impl, release_clients_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for docuclean.
#[derive(Clone)]
pub struct DocucleanServer {
    tool_router: ToolRouter<Self>,
    state: Arc<ServerState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl DocucleanServer {
    /// Create a new server handler.
    pub fn new(state: ServerState) -> Self {
        Self { tool_router: Self::tool_router(), state: Arc::new(state) }
    }

    #[tool(
        description = "Install a worker version: pre-cache every static asset of the generation atomically, then activate it if no version is active or skip-waiting applies."
    )]
    async fn worker_install(&self, params: Parameters<WorkerInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.state, params.0).await
    }

    #[tool(description = "Report that every page controlled by the active version has closed, activating any waiting version.")]
    async fn worker_release_clients(&self) -> Result<CallToolResult, McpError> {
        release_clients_impl(&self.state).await
    }

    #[tool(description = "Post a control message to the worker. The only message understood is {\"type\": \"SKIP_WAITING\"}.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Fetch a URL as a controlled page would. Static assets are served cache-first with background revalidation; offline navigations fall back to the entry document."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Show the registration, every cache generation in the store and revalidation counters.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state).await
    }

    #[tool(description = "List the request URLs stored in a cache generation (default: the active one).")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.state, params.0).await
    }

    #[tool(description = "Fetch aggregate usage counters from the processing backend.")]
    async fn analytics_stats(&self) -> Result<CallToolResult, McpError> {
        analytics::stats_impl(&self.state).await
    }
}

impl ServerHandler for DocucleanServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "docuclean-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::state;

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let (state, _network) = state().await;
        let server = DocucleanServer::new(state);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "analytics_stats",
                "cache_keys",
                "cache_status",
                "worker_fetch",
                "worker_install",
                "worker_message",
                "worker_release_clients",
            ]
        );
    }
}
