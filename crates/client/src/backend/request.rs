//! Processing backend request types.

use serde::{Deserialize, Serialize};

use super::BackendError;

/// Analytics event names the page emits.
pub mod event {
    pub const PAGE_VISIT: &str = "page_visit";
    pub const FILE_UPLOAD: &str = "file_upload";
    pub const FILE_DOWNLOAD: &str = "file_download";
}

/// Cleaning parameters shared by `/preview` and `/process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Comma-separated watermark keywords to redact.
    #[serde(default)]
    pub keywords: String,

    /// Header band height to mask, in points (default 0).
    #[serde(default)]
    pub header_h: u32,

    /// Footer band height to mask, in points (default 25).
    #[serde(default = "default_footer_h")]
    pub footer_h: u32,

    /// Only redact case-exact keyword matches.
    #[serde(default)]
    pub match_case: bool,
}

fn default_footer_h() -> u32 {
    25
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self { keywords: String::new(), header_h: 0, footer_h: default_footer_h(), match_case: false }
    }
}

impl CleanOptions {
    /// Keywords as the backend reads them: split on commas, trimmed, blanks dropped.
    pub fn keyword_list(&self) -> Vec<String> {
        split_keywords(&self.keywords)
    }

    /// Multipart text fields, in the order the backend declares them.
    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("keywords", self.keywords.clone()),
            ("header_h", self.header_h.to_string()),
            ("footer_h", self.footer_h.to_string()),
            ("match_case", self.match_case.to_string()),
        ]
    }
}

/// Split a comma-joined keyword string.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|k| !k.is_empty()).map(String::from).collect()
}

/// An analytics beacon for `/analytics/track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub session_id: String,
    pub event_type: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl AnalyticsEvent {
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.session_id.is_empty() {
            return Err(BackendError::InvalidInput("session_id cannot be empty".to_string()));
        }
        if self.event_type.is_empty() {
            return Err(BackendError::InvalidInput("event_type cannot be empty".to_string()));
        }
        if chrono::DateTime::parse_from_rfc3339(&self.timestamp).is_err() {
            return Err(BackendError::InvalidInput(format!("timestamp is not RFC 3339: {}", self.timestamp)));
        }
        Ok(())
    }
}
