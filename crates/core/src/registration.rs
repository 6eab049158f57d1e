//! Host runtime for worker versions.
//!
//! Dispatches install, activate, message and fetch events the way a browser
//! does for one registration scope: at most one active version, at most one
//! waiting version, and the active generation persisted in the cache store
//! so a restarted host resumes without reinstalling.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::CacheDb;
use crate::controller::{
    CacheController, ControlMessage, ControllerConfig, FetchEvent, FetchOutcome, Handled, ResponseSource,
    WorkerState, WorkerVersion,
};
use crate::network::Network;

/// Snapshot of a registration for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub scope: String,
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub clients_claimed: bool,
}

pub struct Registration {
    scope: String,
    store: CacheDb,
    network: Arc<dyn Network>,
    active: Option<WorkerVersion>,
    waiting: Option<WorkerVersion>,
    clients_claimed: bool,
}

impl Registration {
    /// An empty registration for the origin in `scope`.
    pub fn new(store: CacheDb, network: Arc<dyn Network>, scope: &url::Url) -> Self {
        Self {
            scope: scope.origin().ascii_serialization(),
            store,
            network,
            active: None,
            waiting: None,
            clients_claimed: false,
        }
    }

    /// Resume from the persisted record, then deploy `config`.
    ///
    /// A previously active generation whose cache still exists keeps
    /// controlling fetches. If `config` names a different generation it is
    /// installed on top; an install failure is logged and leaves the resumed
    /// version in charge (or no worker at all on a first run).
    pub async fn restore(store: CacheDb, network: Arc<dyn Network>, config: ControllerConfig) -> Result<Self, Error> {
        let mut registration = Self::new(store, network, &config.origin);

        if let Some(record) = registration.store.active_generation(&registration.scope).await?
            && registration.store.has_cache(&record.active_generation).await?
        {
            let resumed = ControllerConfig { generation: record.active_generation.clone(), ..config.clone() };
            let controller = CacheController::new(resumed, registration.store.clone(), registration.network.clone());
            registration.active = Some(WorkerVersion::resumed(controller));
            registration.clients_claimed = true;
            tracing::info!(generation = %record.active_generation, "resumed active worker");

            if record.active_generation == config.generation {
                return Ok(registration);
            }
        }

        if let Err(e) = registration.register(config).await {
            tracing::warn!(error = %e, "worker not installed; pages run without offline support");
        }

        Ok(registration)
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// Returns the state the new version ended in (`waiting` or `active`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` when the install is aborted; the
    /// previously active version, if any, is untouched.
    pub async fn register(&mut self, config: ControllerConfig) -> Result<WorkerState, Error> {
        let skip_waiting = config.skip_waiting_on_install;
        let controller = CacheController::new(config, self.store.clone(), self.network.clone());
        let mut worker = WorkerVersion::new(controller);

        if let Err(e) = worker.controller().install().await {
            worker.advance(WorkerState::Redundant);
            return Err(e);
        }
        worker.advance(WorkerState::Waiting);
        if skip_waiting {
            worker.request_skip_waiting();
        }

        if let Some(mut previous) = self.waiting.take() {
            previous.advance(WorkerState::Redundant);
        }

        if self.active.is_none() || worker.skip_waiting_requested() {
            self.activate(worker).await?;
            Ok(WorkerState::Active)
        } else {
            self.waiting = Some(worker);
            Ok(WorkerState::Waiting)
        }
    }

    /// Deliver a control message posted by a page.
    ///
    /// Returns the new state of the waiting version, or `None` when nothing
    /// was waiting.
    pub async fn post_message(&mut self, value: &serde_json::Value) -> Result<Option<WorkerState>, Error> {
        match ControlMessage::parse(value)? {
            ControlMessage::SkipWaiting => {
                let Some(mut worker) = self.waiting.take() else {
                    tracing::debug!("SKIP_WAITING with no waiting worker");
                    return Ok(None);
                };
                worker.request_skip_waiting();
                self.activate(worker).await?;
                Ok(Some(WorkerState::Active))
            }
        }
    }

    /// Every page controlled by the active version has closed.
    ///
    /// Activates the waiting version, if any.
    pub async fn release_clients(&mut self) -> Result<Option<WorkerState>, Error> {
        self.clients_claimed = false;
        match self.waiting.take() {
            Some(worker) => {
                self.activate(worker).await?;
                Ok(Some(WorkerState::Active))
            }
            None => Ok(None),
        }
    }

    async fn activate(&mut self, mut worker: WorkerVersion) -> Result<(), Error> {
        worker.controller().activate().await?;
        self.store.set_active_generation(&self.scope, worker.generation()).await?;

        if let Some(mut previous) = self.active.take() {
            previous.advance(WorkerState::Superseded);
        }
        worker.advance(WorkerState::Active);
        self.active = Some(worker);
        self.clients_claimed = true;
        Ok(())
    }

    /// Dispatch a fetch event to the active version.
    pub async fn fetch(&self, event: &mut FetchEvent) -> Result<Handled, Error> {
        dispatch_fetch(self.active_controller(), self.network.as_ref(), event).await
    }

    pub fn active_controller(&self) -> Option<CacheController> {
        self.active.as_ref().map(|w| w.controller().clone())
    }

    pub fn network(&self) -> Arc<dyn Network> {
        self.network.clone()
    }

    pub fn store(&self) -> &CacheDb {
        &self.store
    }

    pub fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            scope: self.scope.clone(),
            active: self.active.as_ref().map(|w| w.generation().to_string()),
            waiting: self.waiting.as_ref().map(|w| w.generation().to_string()),
            clients_claimed: self.clients_claimed,
        }
    }
}

/// Route a fetch event through `controller`, or straight to the network
/// when there is no controller or it declines the request.
///
/// Split out from [`Registration::fetch`] so hosts can release their lock
/// on the registration before awaiting the network.
pub async fn dispatch_fetch(
    controller: Option<CacheController>, network: &dyn Network, event: &mut FetchEvent,
) -> Result<Handled, Error> {
    if let Some(controller) = controller
        && let FetchOutcome::Responded(handled) = controller.handle_fetch(event).await?
    {
        return Ok(handled);
    }

    let response = network.fetch(event.request()).await?;
    Ok(Handled { response, source: ResponseSource::Network })
}
