//! Per-page session state.
//!
//! One [`Session`] per page load: the analytics session id, the chosen PDF
//! and the current cleaning options.

use bytes::Bytes;

use crate::backend::{AnalyticsEvent, BackendError, CleanOptions, CleanedDocument, event};

const PDF_MAGIC: &[u8] = b"%PDF";

/// A PDF the user picked for cleaning.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    bytes: Bytes,
}

impl SelectedFile {
    /// Accept `bytes` if they look like a PDF, by extension or by header.
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Result<Self, BackendError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BackendError::InvalidInput("file name cannot be empty".to_string()));
        }
        if bytes.is_empty() {
            return Err(BackendError::InvalidInput(format!("{name} is empty")));
        }
        let pdf_extension = name.rsplit_once('.').is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"));
        if !pdf_extension && !bytes.starts_with(PDF_MAGIC) {
            return Err(BackendError::InvalidInput(format!("{name} is not a PDF")));
        }
        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    file: Option<SelectedFile>,
    options: CleanOptions,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), file: None, options: CleanOptions::default() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CleanOptions {
        &mut self.options
    }

    /// Replace the selected file. Returns the upload event to report.
    pub fn select(&mut self, file: SelectedFile) -> AnalyticsEvent {
        let event = self.event(event::FILE_UPLOAD, Some(file.size()), Some(file.name().to_string()));
        tracing::debug!("session {} selected {} ({} bytes)", self.id, file.name(), file.size());
        self.file = Some(file);
        event
    }

    /// Merge backend-detected keywords into the current list, keeping order and skipping repeats.
    pub fn merge_keywords(&mut self, detected: &[String]) {
        let mut keywords = self.options.keyword_list();
        for keyword in detected {
            if !keywords.contains(keyword) {
                keywords.push(keyword.clone());
            }
        }
        self.options.keywords = keywords.join(", ");
    }

    pub fn page_visit(&self) -> AnalyticsEvent {
        self.event(event::PAGE_VISIT, None, None)
    }

    pub fn download(&self, document: &CleanedDocument) -> AnalyticsEvent {
        self.event(event::FILE_DOWNLOAD, Some(document.bytes.len() as u64), Some(document.file_name.clone()))
    }

    fn event(&self, event_type: &str, file_size: Option<u64>, file_name: Option<String>) -> AnalyticsEvent {
        AnalyticsEvent {
            session_id: self.id.clone(),
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            file_size,
            file_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, Bytes::from_static(b"%PDF-1.7\n%%EOF")).unwrap()
    }

    #[test]
    fn test_selected_file_accepts_extension_or_magic() {
        assert!(SelectedFile::new("Report.PDF", Bytes::from_static(b"binary")).is_ok());
        assert!(SelectedFile::new("scan", Bytes::from_static(b"%PDF-1.4")).is_ok());
    }

    #[test]
    fn test_selected_file_rejects_non_pdf() {
        let result = SelectedFile::new("notes.txt", Bytes::from_static(b"hello"));
        assert!(matches!(result, Err(BackendError::InvalidInput(msg)) if msg.contains("not a PDF")));
        assert!(SelectedFile::new("empty.pdf", Bytes::new()).is_err());
        assert!(SelectedFile::new("  ", Bytes::from_static(b"%PDF")).is_err());
    }

    #[test]
    fn test_session_ids_are_unique_uuids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id(), b.id());
        assert!(uuid::Uuid::parse_str(a.id()).is_ok());
    }

    #[test]
    fn test_events_carry_session_and_valid_timestamp() {
        let mut session = Session::new();

        let visit = session.page_visit();
        assert_eq!(visit.session_id, session.id());
        assert_eq!(visit.event_type, "page_visit");
        assert!(visit.validate().is_ok());

        let upload = session.select(pdf("report.pdf"));
        assert_eq!(upload.event_type, "file_upload");
        assert_eq!(upload.file_name.as_deref(), Some("report.pdf"));
        assert_eq!(upload.file_size, Some(14));
        assert_eq!(session.file().map(SelectedFile::name), Some("report.pdf"));

        let cleaned = CleanedDocument { file_name: "Clean_report.pdf".into(), bytes: Bytes::from_static(b"%PDF") };
        let download = session.download(&cleaned);
        assert_eq!(download.event_type, "file_download");
        assert_eq!(download.file_size, Some(4));
        assert!(download.validate().is_ok());
    }

    #[test]
    fn test_merge_keywords_skips_repeats() {
        let mut session = Session::new();
        session.options_mut().keywords = "CONFIDENTIAL".into();
        session.merge_keywords(&["Draft".to_string(), "CONFIDENTIAL".to_string()]);
        assert_eq!(session.options().keywords, "CONFIDENTIAL, Draft");
    }
}
