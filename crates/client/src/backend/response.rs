//! Processing backend response types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::request::split_keywords;

/// Body of `/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Detected watermark candidates, comma-joined.
    pub keywords: String,
}

impl AnalyzeResponse {
    pub fn keyword_list(&self) -> Vec<String> {
        split_keywords(&self.keywords)
    }
}

/// Body of `/analytics/track`. The backend reports failures in-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl TrackResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Body of `/analytics/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsStats {
    pub unique_visitors: u64,
    pub total_uploads: u64,
    #[serde(default)]
    pub total_downloads: u64,
    #[serde(default)]
    pub total_events: u64,
}

/// One stored analytics row from `/analytics/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub session_id: String,
    pub event_type: String,
    pub timestamp: String,
    pub file_size: Option<i64>,
    /// Holds the uploaded file name despite the column name.
    pub file_extension: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Body of `/analytics/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsExport {
    pub data: Vec<AnalyticsRecord>,
    pub total: u64,
}

/// FastAPI error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: String,
}

/// A cleaned PDF returned by `/process`.
#[derive(Debug, Clone)]
pub struct CleanedDocument {
    pub file_name: String,
    pub bytes: Bytes,
}

/// File name from a `Content-Disposition: attachment; filename=...` header.
pub fn attachment_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
