//! Offline cache controller.
//!
//! ### Install
//! - Fetch every manifest path; any transport error or non-2xx aborts.
//! - Write all entries into the generation's cache in one transaction.
//!
//! ### Activate
//! - Delete every cache whose name is not the current generation.
//!
//! ### Fetch
//! - Non-GET, cross-origin and live API requests are not intercepted.
//! - Hits are served from the store; a background fetch refreshes the entry.
//! - Misses go to the network; successful static assets are stored.
//! - Offline navigations fall back to the cached entry document.

pub mod lifecycle;
pub mod message;
pub mod policy;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

pub use lifecycle::{WorkerState, WorkerVersion};
pub use message::ControlMessage;
pub use policy::{Bypass, Route};

use crate::Error;
use crate::cache::CacheDb;
use crate::network::{Network, Request, Response};

/// Immutable settings of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Cache generation identifier; the only cache that survives activation.
    pub generation: String,
    /// Origin the worker controls. Manifest paths resolve against it.
    pub origin: Url,
    /// Paths pre-populated on install, in order.
    pub manifest: Vec<String>,
    /// Path prefixes that are never intercepted.
    pub live_api_prefixes: Vec<String>,
    /// Lowercase extensions stored lazily on a miss.
    pub static_extensions: Vec<String>,
    /// Entry document served to offline navigations.
    pub fallback_document: String,
    pub skip_waiting_on_install: bool,
}

impl ControllerConfig {
    /// Settings for `origin` with the stock API prefixes and asset types.
    pub fn for_origin(origin: Url, generation: &str, manifest: &[&str]) -> Self {
        Self {
            generation: generation.to_string(),
            origin,
            manifest: manifest.iter().map(|p| p.to_string()).collect(),
            live_api_prefixes: ["/analytics/", "/analyze", "/preview", "/process"].map(String::from).to_vec(),
            static_extensions: ["html", "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp"]
                .map(String::from)
                .to_vec(),
            fallback_document: "/".to_string(),
            skip_waiting_on_install: true,
        }
    }

    /// Absolute URL of an origin-relative path.
    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        self.origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }
}

/// Where a delivered response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
}

/// A response the controller delivered to the page.
#[derive(Debug, Clone)]
pub struct Handled {
    pub response: Response,
    pub source: ResponseSource,
}

/// Result of offering a request to the controller.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page's own network fetch proceeds untouched.
    NotIntercepted(Bypass),
    Responded(Handled),
}

/// One fetch event and the background work registered against it.
///
/// Dropping the event without calling [`FetchEvent::settle`] leaves the
/// registered tasks running detached; aborting them is also safe since
/// their only effect is a single upsert.
#[derive(Debug)]
pub struct FetchEvent {
    request: Request,
    pending: Vec<JoinHandle<()>>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request, pending: Vec::new() }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Keep the event alive until `task` finishes.
    pub fn wait_until(&mut self, task: JoinHandle<()>) {
        self.pending.push(task);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for all registered background work.
    pub async fn settle(self) {
        for task in self.pending {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "background task ended abnormally");
            }
        }
    }

    /// Cancel all registered background work.
    pub fn abort(self) {
        for task in self.pending {
            task.abort();
        }
    }
}

/// Background revalidation counters.
#[derive(Debug, Default)]
pub struct RevalidationStats {
    refreshed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`RevalidationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RevalidationCounts {
    pub refreshed: u64,
    pub failed: u64,
}

impl RevalidationStats {
    pub fn counts(&self) -> RevalidationCounts {
        RevalidationCounts {
            refreshed: self.refreshed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Cache controller for one worker version.
///
/// Holds no mutable state of its own apart from observability counters:
/// everything durable goes through the cache store.
#[derive(Clone)]
pub struct CacheController {
    config: Arc<ControllerConfig>,
    store: CacheDb,
    network: Arc<dyn Network>,
    stats: Arc<RevalidationStats>,
}

impl CacheController {
    pub fn new(config: ControllerConfig, store: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { config: Arc::new(config), store, network, stats: Arc::new(RevalidationStats::default()) }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheDb {
        &self.store
    }

    pub fn revalidation(&self) -> RevalidationCounts {
        self.stats.counts()
    }

    /// Populate the current generation with every manifest asset.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any asset cannot be fetched with a
    /// success status. Nothing is written in that case, and no cache named
    /// by the generation is created.
    pub async fn install(&self) -> Result<usize, Error> {
        let generation = &self.config.generation;
        tracing::info!(%generation, assets = self.config.manifest.len(), "installing");

        let fetches = self.config.manifest.iter().map(|path| async move {
            let url = self.config.resolve(path).map_err(|e| Error::InstallFailed(e.to_string()))?;
            let request = Request::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{path}: status {}", response.status)));
            }
            Ok::<_, Error>(keyed(response, &url))
        });

        let responses = match try_join_all(fetches).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::warn!(%generation, error = %e, "install aborted");
                return Err(e);
            }
        };

        self.store
            .put_all(generation, &responses)
            .await
            .map_err(|e| Error::InstallFailed(format!("writing cache {generation}: {e}")))?;

        tracing::info!(%generation, entries = responses.len(), "installed");
        Ok(responses.len())
    }

    /// Delete every cache generation other than the current one.
    ///
    /// Returns the names that were deleted.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let generation = &self.config.generation;
        let mut deleted = Vec::new();

        for name in self.store.cache_names().await? {
            if name != *generation && self.store.delete_cache(&name).await? {
                tracing::info!(stale = %name, "deleted stale cache");
                deleted.push(name);
            }
        }

        tracing::info!(%generation, deleted = deleted.len(), "activated");
        Ok(deleted)
    }

    /// Handle one fetch event.
    ///
    /// Background revalidation for cache hits is registered on `event`.
    ///
    /// # Errors
    ///
    /// Propagates the network error of a cold-cache miss, unless the request
    /// is a navigation and the fallback document is cached.
    pub async fn handle_fetch(&self, event: &mut FetchEvent) -> Result<FetchOutcome, Error> {
        let request = event.request().clone();

        if let Route::Bypass(reason) = self.config.route(&request) {
            tracing::debug!(url = %request.url, ?reason, "not intercepted");
            return Ok(FetchOutcome::NotIntercepted(reason));
        }

        if let Some(response) = self.cached(&request.url).await {
            tracing::debug!(url = %request.url, "cache hit");
            event.wait_until(self.spawn_revalidation(request));
            return Ok(FetchOutcome::Responded(Handled { response, source: ResponseSource::Cache }));
        }

        tracing::debug!(url = %request.url, "cache miss");
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_success() && self.config.is_static_asset(&request.url) {
                    let entry = keyed(response.clone(), &request.url);
                    match self.store.put_entry(&self.config.generation, &entry).await {
                        Ok(()) => {}
                        Err(Error::CacheMiss(generation)) => {
                            tracing::debug!(url = %request.url, %generation, "generation gone, asset not stored");
                        }
                        Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to store fetched asset"),
                    }
                }
                Ok(FetchOutcome::Responded(Handled { response, source: ResponseSource::Network }))
            }
            Err(err) if request.is_navigation() => match self.fallback().await {
                Some(response) => {
                    tracing::debug!(url = %request.url, error = %err, "offline navigation served from fallback");
                    Ok(FetchOutcome::Responded(Handled { response, source: ResponseSource::Fallback }))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Cached response for `url` in the current generation.
    ///
    /// Store read failures are treated as misses.
    async fn cached(&self, url: &Url) -> Option<Response> {
        let stored = match self.store.match_entry(&self.config.generation, url).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(%url, error = %e, "cache read failed");
                return None;
            }
        };
        match stored.into_response() {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(%url, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    async fn fallback(&self) -> Option<Response> {
        let url = self.config.resolve(&self.config.fallback_document).ok()?;
        self.cached(&url).await
    }

    fn spawn_revalidation(&self, request: Request) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.revalidate(&request).await })
    }

    async fn revalidate(&self, request: &Request) {
        let refreshed = match self.network.fetch(request).await {
            Ok(response) if response.is_success() => {
                let entry = keyed(response, &request.url);
                match self.store.put_entry(&self.config.generation, &entry).await {
                    Ok(()) => true,
                    Err(Error::CacheMiss(generation)) => {
                        tracing::debug!(url = %request.url, %generation, "generation gone, revalidation dropped");
                        false
                    }
                    Err(e) => {
                        tracing::debug!(url = %request.url, error = %e, "revalidation write failed");
                        false
                    }
                }
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "revalidation kept cached entry");
                false
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "revalidation fetch failed");
                false
            }
        };

        let counter = if refreshed { &self.stats.refreshed } else { &self.stats.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Store responses under the URL that was requested, not the redirect target.
fn keyed(mut response: Response, request_url: &Url) -> Response {
    response.url = request_url.clone();
    response
}
