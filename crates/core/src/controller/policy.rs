//! Per-request interception policy.

use serde::Serialize;
use url::Url;

use super::ControllerConfig;
use crate::network::Request;

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Bypass {
    NonGet,
    CrossOrigin,
    LiveApi,
}

/// What the controller does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Bypass(Bypass),
    CacheFirst,
}

impl ControllerConfig {
    /// Decide how `request` is handled. Bypassed requests never touch the
    /// cache store.
    pub fn route(&self, request: &Request) -> Route {
        if !request.is_get() {
            return Route::Bypass(Bypass::NonGet);
        }
        if request.url.origin() != self.origin.origin() {
            return Route::Bypass(Bypass::CrossOrigin);
        }
        if self.is_live_api(request.url.path()) {
            return Route::Bypass(Bypass::LiveApi);
        }
        Route::CacheFirst
    }

    /// Whether `path` contains one of the live API prefixes anywhere,
    /// so mounted or versioned APIs such as `/api/analyze` still match.
    pub fn is_live_api(&self, path: &str) -> bool {
        self.live_api_prefixes.iter().any(|prefix| path.contains(prefix.as_str()))
    }

    /// Whether a successful miss for `url` should be stored lazily.
    pub fn is_static_asset(&self, url: &Url) -> bool {
        let file_name = url.path().rsplit('/').next().unwrap_or_default();
        match file_name.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.static_extensions.iter().any(|known| *known == ext)
            }
            None => false,
        }
    }
}
