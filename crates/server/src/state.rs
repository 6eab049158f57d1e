//! Shared state behind the MCP tools.

use std::sync::Arc;

use anyhow::Result;
use docuclean_client::{BackendClient, BackendConfig, FetchClient, FetchConfig};
use docuclean_core::{AppConfig, CacheDb, ControllerConfig, Network, Registration};
use tokio::sync::Mutex;

pub struct ServerState {
    /// The one registration this host serves.
    pub registration: Mutex<Registration>,
    /// Settings `worker_install` deploys unless overridden.
    pub deploy: ControllerConfig,
    pub backend: Option<BackendClient>,
}

impl ServerState {
    pub fn new(registration: Registration, deploy: ControllerConfig, backend: Option<BackendClient>) -> Self {
        Self { registration: Mutex::new(registration), deploy, backend }
    }

    /// Open the cache store, resume the persisted registration and deploy
    /// the configured generation.
    pub async fn bootstrap(config: &AppConfig) -> Result<Self> {
        let deploy = config.controller_config()?;
        let store = CacheDb::open(&config.db_path).await?;
        let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from_app(config))?);

        let registration = Registration::restore(store, network, deploy.clone()).await?;
        let status = registration.status();
        tracing::info!(
            "registration for {} restored: active={:?} waiting={:?}",
            status.scope,
            status.active,
            status.waiting
        );

        let backend = BackendClient::new(BackendConfig::from_app(config)?)?;
        tracing::info!("processing backend at {}", backend.config().base_url);

        Ok(Self::new(registration, deploy, Some(backend)))
    }
}
