//! docuclean-sw server entry point.
//!
//! Boots the offline cache host and serves it as an MCP server on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use docuclean_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        "Starting docuclean-sw on stdio transport (origin={}, cache_version={}, db={})",
        config.origin,
        config.cache_version,
        config.db_path.display()
    );

    let state = state::ServerState::bootstrap(&config).await?;
    let handler = handler::DocucleanServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
