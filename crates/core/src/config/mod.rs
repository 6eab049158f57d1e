//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCUCLEAN_*)
//! 2. TOML config file (if DOCUCLEAN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::controller::ControllerConfig;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCUCLEAN_*)
/// 2. TOML config file (if DOCUCLEAN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via DOCUCLEAN_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Cache generation identifier of the worker being deployed.
    ///
    /// Set via DOCUCLEAN_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the worker is scoped to. Manifest paths resolve against it.
    ///
    /// Set via DOCUCLEAN_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths pre-populated into the cache on install, in order.
    ///
    /// Set via DOCUCLEAN_STATIC_ASSETS (array syntax, e.g. `["/", "/app.js"]`).
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Path prefixes that always go to the network and are never cached.
    ///
    /// Set via DOCUCLEAN_LIVE_API_PREFIXES environment variable.
    #[serde(default = "default_live_api_prefixes")]
    pub live_api_prefixes: Vec<String>,

    /// File extensions cached lazily on a miss.
    ///
    /// Set via DOCUCLEAN_STATIC_EXTENSIONS environment variable.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Entry document served to offline navigations.
    ///
    /// Set via DOCUCLEAN_FALLBACK_DOCUMENT environment variable.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Whether a freshly installed worker activates without waiting for
    /// existing clients to close.
    ///
    /// Set via DOCUCLEAN_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via DOCUCLEAN_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via DOCUCLEAN_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via DOCUCLEAN_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Quiet period before a preview refresh fires.
    ///
    /// Set via DOCUCLEAN_PREVIEW_DEBOUNCE_MS environment variable.
    #[serde(default = "default_preview_debounce_ms")]
    pub preview_debounce_ms: u64,

    /// Processing backend base URL. Defaults to `origin` when unset.
    ///
    /// Set via DOCUCLEAN_BACKEND_URL environment variable.
    #[serde(default)]
    pub backend_url: Option<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./docuclean-cache.sqlite")
}

fn default_cache_version() -> String {
    "docuclean-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_static_assets() -> Vec<String> {
    ["/", "/static/index.html", "/static/style.css", "/static/script.js", "/static/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_live_api_prefixes() -> Vec<String> {
    ["/analytics/", "/analyze", "/preview", "/process"].into_iter().map(String::from).collect()
}

fn default_static_extensions() -> Vec<String> {
    ["html", "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_fallback_document() -> String {
    "/".into()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "docuclean-sw/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_preview_debounce_ms() -> u64 {
    500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            static_assets: default_static_assets(),
            live_api_prefixes: default_live_api_prefixes(),
            static_extensions: default_static_extensions(),
            fallback_document: default_fallback_document(),
            skip_waiting_on_install: true,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            preview_debounce_ms: default_preview_debounce_ms(),
            backend_url: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Preview debounce quiet period as Duration.
    pub fn preview_debounce(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCUCLEAN_`
    /// 2. TOML file from `DOCUCLEAN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DOCUCLEAN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DOCUCLEAN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed worker origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("origin", &self.origin)
    }

    /// Processing backend base URL, falling back to the worker origin.
    pub fn backend_base_url(&self) -> Result<Url, ConfigError> {
        match self.backend_url.as_deref() {
            Some(raw) => parse_http_url("backend_url", raw),
            None => self.origin_url(),
        }
    }

    /// Build the immutable settings a worker version runs with.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        Ok(ControllerConfig {
            generation: self.cache_version.clone(),
            origin: self.origin_url()?,
            manifest: self.static_assets.clone(),
            live_api_prefixes: self.live_api_prefixes.clone(),
            static_extensions: self.static_extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            fallback_document: self.fallback_document.clone(),
            skip_waiting_on_install: self.skip_waiting_on_install,
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid { field: field.into(), reason: e.to_string() })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::Invalid { field: field.into(), reason: format!("unsupported scheme: {scheme}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./docuclean-cache.sqlite"));
        assert_eq!(config.cache_version, "docuclean-v1");
        assert_eq!(config.user_agent, "docuclean-sw/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.fallback_document, "/");
        assert!(config.skip_waiting_on_install);
        assert!(config.static_assets.contains(&"/".to_string()));
        assert!(config.live_api_prefixes.contains(&"/analytics/".to_string()));
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.preview_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_backend_falls_back_to_origin() {
        let config = AppConfig::default();
        assert_eq!(config.backend_base_url().unwrap().as_str(), "http://localhost:8000/");

        let config = AppConfig { backend_url: Some("https://api.example.com".into()), ..Default::default() };
        assert_eq!(config.backend_base_url().unwrap().host_str(), Some("api.example.com"));
    }

    #[test]
    fn test_origin_rejects_non_http() {
        let config = AppConfig { origin: "file:///srv/www".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_controller_config_lowercases_extensions() {
        let config = AppConfig { static_extensions: vec!["PNG".into(), "Css".into()], ..Default::default() };
        let controller = config.controller_config().unwrap();
        assert_eq!(controller.static_extensions, vec!["png".to_string(), "css".to_string()]);
        assert_eq!(controller.generation, "docuclean-v1");
    }
}
