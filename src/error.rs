//! Error types for the pdf-translate-client library.
//!
//! Three layers, each with its own type:
//!
//! * [`ServiceError`]: what went wrong talking to the translation service
//!   (connection refused, HTTP 500, undecodable JSON). Returned by every
//!   [`crate::service::TranslationService`] method.
//!
//! * [`SessionError`]: what the controller reports to the presentation
//!   layer. Service errors are folded into one of five session-level
//!   categories at the boundary of each async operation, so a caller can tell
//!   *which step* failed without ever handling a transport error directly.
//!
//! * [`ClientError`]: setup problems outside a session: invalid
//!   configuration, unreadable input file, artifact write failure.

use crate::session::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Why a candidate file was refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name does not end with the accepted extension (exact, case-sensitive).
    #[error("Only {expected} files can be uploaded (got '{name}')")]
    WrongExtension { name: String, expected: String },

    /// File is larger than the upload ceiling.
    #[error("File size cannot exceed {} (got {})", human_size(.max), human_size(.size))]
    TooLarge { size: u64, max: u64 },
}

/// Errors surfaced by the upload session controller.
///
/// Every variant is cheap to clone so the most recent one can be kept in
/// [`crate::session::SessionSnapshot::error`] for render loops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    // ── Taxonomy ──────────────────────────────────────────────────────────
    /// File rejected locally. The session stays `Idle`.
    #[error("File rejected: {0}")]
    Validation(#[from] ValidationError),

    /// The upload call failed. Terminal until reset.
    #[error("Upload failed: {message}")]
    Submission { message: String },

    /// A status check failed at the transport level. Terminal until reset.
    #[error("Status check failed: {message}")]
    StatusCheck { message: String },

    /// The service reported the task as failed. Terminal until reset.
    #[error("Processing failed: {message}")]
    ServiceReportedFailure { message: String },

    /// Fetching the translated document failed. The session stays
    /// `Completed`, so the download may be retried.
    #[error("Download failed: {message}")]
    Download { message: String },

    // ── Misuse ────────────────────────────────────────────────────────────
    /// A file was selected while another session is live.
    #[error("A session is already in progress (phase: {phase}); reset it first")]
    Busy { phase: Phase },

    /// `download` was called before the task completed.
    #[error("No translated document is available (phase: {phase})")]
    NotReady { phase: Phase },
}

impl SessionError {
    /// `true` for failures that end the session (only `reset` leaves them).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::Submission { .. }
                | SessionError::StatusCheck { .. }
                | SessionError::ServiceReportedFailure { .. }
        )
    }
}

/// Errors from a single call to the translation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The endpoint URL could not be built from the configured base URL.
    #[error("Invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request never produced an HTTP response (DNS, refused, timeout).
    #[error("Request to {endpoint} failed: {reason}")]
    Transport {
        endpoint: String,
        reason: String,
        timed_out: bool,
    },

    /// The service answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}{}", detail_suffix(.detail))]
    Status {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },

    /// The response body was not the JSON we expected.
    #[error("Could not decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl ServiceError {
    /// The service's structured `detail` field, when it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ServiceError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// `true` when the request timed out rather than being refused.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Transport { timed_out: true, .. })
    }
}

fn human_size(bytes: &u64) -> String {
    crate::file::format_file_size(*bytes)
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Errors that happen outside a session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input path has no usable file name.
    #[error("'{path}' has no file name")]
    NoFileName { path: PathBuf },

    /// Could not write the downloaded document.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_extension_display() {
        let e = ValidationError::WrongExtension {
            name: "notes.txt".into(),
            expected: ".pdf".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".pdf"), "got: {msg}");
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn too_large_display_uses_human_sizes() {
        let e = ValidationError::TooLarge {
            size: 60 * 1024 * 1024,
            max: 50 * 1024 * 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("50 MB"), "got: {msg}");
        assert!(msg.contains("60 MB"), "got: {msg}");
    }

    #[test]
    fn status_display_with_and_without_detail() {
        let with = ServiceError::Status {
            endpoint: "/api/upload".into(),
            status: 500,
            detail: Some("server busy".into()),
        };
        assert_eq!(with.to_string(), "/api/upload returned HTTP 500: server busy");
        assert_eq!(with.detail(), Some("server busy"));

        let without = ServiceError::Status {
            endpoint: "/api/status/t1".into(),
            status: 404,
            detail: None,
        };
        assert_eq!(without.to_string(), "/api/status/t1 returned HTTP 404");
        assert_eq!(without.detail(), None);
    }

    #[test]
    fn transport_timeout_flag() {
        let e = ServiceError::Transport {
            endpoint: "/api/status/t1".into(),
            reason: "operation timed out".into(),
            timed_out: true,
        };
        assert!(e.is_timeout());
        assert!(e.detail().is_none());
    }

    #[test]
    fn terminal_classification() {
        assert!(SessionError::Submission { message: "x".into() }.is_terminal());
        assert!(SessionError::StatusCheck { message: "x".into() }.is_terminal());
        assert!(SessionError::ServiceReportedFailure { message: "x".into() }.is_terminal());
        assert!(!SessionError::Download { message: "x".into() }.is_terminal());
        assert!(!SessionError::Validation(ValidationError::TooLarge { size: 2, max: 1 }).is_terminal());
    }

    #[test]
    fn busy_display_names_phase() {
        let e = SessionError::Busy {
            phase: Phase::Polling,
        };
        assert!(e.to_string().contains("Polling"));
    }
}
