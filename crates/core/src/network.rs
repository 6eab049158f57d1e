//! Request/response model and the network boundary.
//!
//! The controller never talks to a socket directly: every outbound request
//! goes through a [`Network`] implementation so hosts can plug in reqwest,
//! and tests can script responses.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How a request was initiated by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    /// Sub-resource fetch from the same origin.
    #[default]
    SameOrigin,
    /// Sub-resource fetch that may cross origins.
    Cors,
    NoCors,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: impl Into<String>, url: Url, mode: RequestMode) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url, mode }
    }

    /// A sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::SameOrigin)
    }

    /// A top-level navigation GET.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response as seen by the page or stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outbound HTTP used by the controller.
///
/// Implementations return `Ok` for any HTTP status; `Err` means the request
/// produced no response at all (offline, timeout, oversized body).
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_method_is_normalized() {
        let req = Request::new("get", url("https://example.com/"), RequestMode::Cors);
        assert!(req.is_get());
        assert!(!req.is_navigation());
        assert!(!Request::new("POST", url("https://example.com/"), RequestMode::Cors).is_get());
    }

    #[test]
    fn test_navigation_constructor() {
        assert!(Request::navigate(url("https://example.com/")).is_navigation());
        assert!(!Request::get(url("https://example.com/app.js")).is_navigation());
    }

    #[test]
    fn test_success_range() {
        let mut response = Response {
            url: url("https://example.com/"),
            status: 200,
            content_type: None,
            headers: vec![("ETag".into(), "\"abc\"".into())],
            body: Bytes::new(),
        };
        assert!(response.is_success());
        assert_eq!(response.header("etag"), Some("\"abc\""));

        response.status = 304;
        assert!(!response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }

    #[test]
    fn test_mode_serde() {
        let mode: RequestMode = serde_json::from_str("\"navigate\"").unwrap();
        assert_eq!(mode, RequestMode::Navigate);
        assert_eq!(serde_json::to_string(&RequestMode::SameOrigin).unwrap(), "\"same-origin\"");
        assert_eq!(serde_json::to_string(&RequestMode::NoCors).unwrap(), "\"no-cors\"");
    }
}
