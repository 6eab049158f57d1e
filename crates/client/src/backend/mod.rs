//! Processing backend client.
//!
//! Talks to the document-cleaning service the page sits in front of.
//! These are the live API routes the cache controller never intercepts.
//!
//! ### Endpoints
//!
//! - `POST /analyze`: multipart `file`, returns `{keywords}`.
//! - `POST /preview`: multipart `file` plus [`CleanOptions`], returns a PNG of page one.
//! - `POST /process`: multipart `file` plus [`CleanOptions`], returns the cleaned PDF
//!   as an attachment named `Clean_<original>`.
//! - `POST /analytics/track`: JSON [`AnalyticsEvent`], returns `{status, message?}`.
//! - `GET /analytics/stats`: returns [`AnalyticsStats`].
//! - `GET /analytics/export`: returns every stored event.
//!
//! Error statuses carry a FastAPI `{detail}` body, surfaced as [`BackendError::Http`].

pub mod error;
pub mod request;
pub mod response;

pub use error::BackendError;
pub use request::{AnalyticsEvent, CleanOptions, event, split_keywords};
pub use response::{
    AnalyticsExport, AnalyticsRecord, AnalyticsStats, AnalyzeResponse, CleanedDocument, TrackResponse,
    attachment_filename,
};

use bytes::Bytes;
use reqwest::header;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::session::SelectedFile;

/// Default request timeout. Processing large PDFs is slow.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "docuclean-sw/0.1";

/// Backend client configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL the endpoint paths are joined onto.
    pub base_url: Url,
    /// Request timeout (default: 60s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self { base_url, timeout: DEFAULT_TIMEOUT, user_agent: DEFAULT_USER_AGENT.to_string() }
    }

    /// Build from application config. The backend defaults to the page origin.
    pub fn from_app(config: &docuclean_core::AppConfig) -> Result<Self, BackendError> {
        let base_url = config.backend_base_url().map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        Ok(Self { user_agent: config.user_agent.clone(), ..Self::new(base_url) })
    }
}

/// Processing backend client.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| BackendError::Network(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.config.base_url.join(path).map_err(|e| BackendError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Ask the backend for watermark candidates in `file`.
    pub async fn analyze(&self, file: &SelectedFile) -> Result<AnalyzeResponse, BackendError> {
        let form = Form::new().part("file", file_part(file)?);
        let response = self.http.post(self.endpoint("analyze")?).multipart(form).send().await?;
        let response = check_status(response).await?;
        json_body(response).await
    }

    /// Render page one of `file` with `options` applied. Returns PNG bytes.
    pub async fn preview(&self, file: &SelectedFile, options: &CleanOptions) -> Result<Bytes, BackendError> {
        let start = Instant::now();
        let form = clean_form(file, options)?;
        let response = self.http.post(self.endpoint("preview")?).multipart(form).send().await?;
        let response = check_status(response).await?;
        let png = response.bytes().await?;
        tracing::debug!("preview for {} rendered in {:?} ({} bytes)", file.name(), start.elapsed(), png.len());
        Ok(png)
    }

    /// Clean every page of `file` with `options`.
    pub async fn process(&self, file: &SelectedFile, options: &CleanOptions) -> Result<CleanedDocument, BackendError> {
        let start = Instant::now();
        let form = clean_form(file, options)?;
        let response = self.http.post(self.endpoint("process")?).multipart(form).send().await?;
        let response = check_status(response).await?;

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("Clean_{}", file.name()));
        let bytes = response.bytes().await?;

        tracing::info!("processed {} in {:?}", file.name(), start.elapsed());
        Ok(CleanedDocument { file_name, bytes })
    }

    /// Record an analytics event. In-band failures are returned as-is.
    pub async fn track(&self, event: &AnalyticsEvent) -> Result<TrackResponse, BackendError> {
        event.validate()?;
        let response = self.http.post(self.endpoint("analytics/track")?).json(event).send().await?;
        let response = check_status(response).await?;
        let tracked: TrackResponse = json_body(response).await?;
        if !tracked.is_success() {
            tracing::warn!(
                "analytics event {} rejected: {}",
                event.event_type,
                tracked.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(tracked)
    }

    /// Aggregate analytics counters.
    pub async fn stats(&self) -> Result<AnalyticsStats, BackendError> {
        self.get_json("analytics/stats").await
    }

    /// Every recorded analytics event.
    pub async fn export(&self) -> Result<AnalyticsExport, BackendError> {
        self.get_json("analytics/export").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        json_body(response).await
    }
}

fn file_part(file: &SelectedFile) -> Result<Part, BackendError> {
    Part::bytes(file.bytes().to_vec())
        .file_name(file.name().to_string())
        .mime_str("application/pdf")
        .map_err(BackendError::from)
}

fn clean_form(file: &SelectedFile, options: &CleanOptions) -> Result<Form, BackendError> {
    let form = options
        .form_fields()
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));
    Ok(form.part("file", file_part(file)?))
}

/// Map error statuses to [`BackendError::Http`] with the backend's `detail`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<response::ErrorBody>(&body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
    tracing::debug!("backend returned {}: {}", status, detail);

    Err(BackendError::Http { status: status.as_u16(), detail })
}

async fn json_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response after reading the full request.
    /// Returns the base URL and a handle yielding the raw request text.
    async fn serve_once(raw: String) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(raw.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (Url::parse(&format!("http://{addr}/")).unwrap(), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let head = text[..head_end].to_ascii_lowercase();
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        match content_length {
            Some(len) => request.len() >= head_end + 4 + len,
            None if head.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
            None => true,
        }
    }

    fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut raw = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str("\r\n");
        raw.push_str(body);
        raw
    }

    fn client(base: Url) -> BackendClient {
        BackendClient::new(BackendConfig { timeout: Duration::from_secs(5), ..BackendConfig::new(base) }).unwrap()
    }

    fn pdf() -> SelectedFile {
        SelectedFile::new("report.pdf", Bytes::from_static(b"%PDF-1.7\n%%EOF")).unwrap()
    }

    #[test]
    fn test_config_from_app_defaults_to_origin() {
        let app = docuclean_core::AppConfig::default();
        let config = BackendConfig::from_app(&app).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.user_agent, app.user_agent);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_config_from_app_backend_override() {
        let app = docuclean_core::AppConfig {
            backend_url: Some("https://api.example.com/v2/".into()),
            ..Default::default()
        };
        let config = BackendConfig::from_app(&app).unwrap();
        let client = BackendClient::new(config).unwrap();
        assert_eq!(client.endpoint("analyze").unwrap().as_str(), "https://api.example.com/v2/analyze");
    }

    #[tokio::test]
    async fn test_stats_parses_counters() {
        let body = r#"{"unique_visitors": 3, "total_uploads": 7, "total_downloads": 5, "total_events": 15}"#;
        let (base, server) = serve_once(http_response("200 OK", &[("Content-Type", "application/json")], body)).await;

        let stats = client(base).stats().await.unwrap();
        assert_eq!(stats.unique_visitors, 3);
        assert_eq!(stats.total_uploads, 7);
        assert_eq!(stats.total_downloads, 5);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /analytics/stats HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_error_status_surfaces_detail() {
        let body = r#"{"detail": "Could not generate preview"}"#;
        let (base, _server) = serve_once(http_response("500 Internal Server Error", &[], body)).await;

        let err = client(base).preview(&pdf(), &CleanOptions::default()).await.unwrap_err();
        match err {
            BackendError::Http { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "Could not generate preview");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_track_posts_json_event() {
        let (base, server) = serve_once(http_response("200 OK", &[], r#"{"status": "success"}"#)).await;

        let event = AnalyticsEvent {
            session_id: "abc".into(),
            event_type: event::PAGE_VISIT.into(),
            timestamp: "2026-10-18T09:00:00Z".into(),
            file_size: None,
            file_name: None,
        };
        let tracked = client(base).track(&event).await.unwrap();
        assert!(tracked.is_success());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /analytics/track HTTP/1.1"));
        assert!(request.contains(r#""event_type":"page_visit""#));
    }

    #[tokio::test]
    async fn test_process_names_download_from_header() {
        let (base, server) = serve_once(http_response(
            "200 OK",
            &[("Content-Type", "application/pdf"), ("Content-Disposition", "attachment; filename=Clean_report.pdf")],
            "%PDF-1.7 cleaned",
        ))
        .await;

        let options = CleanOptions { keywords: "CONFIDENTIAL".into(), match_case: true, ..Default::default() };
        let cleaned = client(base).process(&pdf(), &options).await.unwrap();
        assert_eq!(cleaned.file_name, "Clean_report.pdf");
        assert_eq!(&cleaned.bytes[..], b"%PDF-1.7 cleaned");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /process HTTP/1.1"));
        assert!(request.contains("name=\"keywords\""));
        assert!(request.contains("CONFIDENTIAL"));
        assert!(request.contains("name=\"footer_h\""));
        assert!(request.contains("filename=\"report.pdf\""));
    }

    #[tokio::test]
    async fn test_process_falls_back_to_prefixed_name() {
        let (base, _server) =
            serve_once(http_response("200 OK", &[("Content-Type", "application/pdf")], "%PDF")).await;

        let cleaned = client(base).process(&pdf(), &CleanOptions::default()).await.unwrap();
        assert_eq!(cleaned.file_name, "Clean_report.pdf");
    }

    #[tokio::test]
    async fn test_track_rejects_invalid_event_before_sending() {
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let event = AnalyticsEvent {
            session_id: String::new(),
            event_type: event::PAGE_VISIT.into(),
            timestamp: "2026-10-18T09:00:00Z".into(),
            file_size: None,
            file_name: None,
        };
        assert!(matches!(client(base).track(&event).await, Err(BackendError::InvalidInput(_))));
    }
}
