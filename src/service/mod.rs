//! The remote translation service, seen from the client.
//!
//! The controller only ever talks to [`TranslationService`]; the production
//! implementation is [`HttpService`]. Keeping the trait object-safe lets the
//! controller hold an `Arc<dyn TranslationService>` and lets tests substitute
//! a scripted in-memory service without a network.
//!
//! ## Endpoints
//!
//! ```text
//! POST /api/upload              multipart "file"  → {task_id}
//! GET  /api/status/{task_id}                      → {status, progress?, message?, error?}
//! GET  /api/download/{task_id}                    → translated PDF bytes
//! GET  /api/health                                → {status, timestamp}
//! ```

pub mod http;
pub mod types;

use crate::error::ServiceError;
use crate::file::SelectedFile;
use async_trait::async_trait;
use bytes::Bytes;

pub use http::HttpService;
pub use types::{HealthReport, StatusSnapshot, Submission, TaskId, TaskStatus};

/// The three calls the upload workflow needs, plus a health probe.
///
/// Implementations must map every failure to a [`ServiceError`]; the
/// controller decides what each failure means for the session.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Upload a document and obtain its task id.
    async fn submit(&self, file: &SelectedFile) -> Result<Submission, ServiceError>;

    /// Fetch the current status of a task.
    async fn poll_status(&self, task_id: &TaskId) -> Result<StatusSnapshot, ServiceError>;

    /// Fetch the translated document of a completed task.
    async fn fetch_result(&self, task_id: &TaskId) -> Result<Bytes, ServiceError>;

    /// Probe the service's health endpoint.
    async fn health(&self) -> Result<HealthReport, ServiceError>;
}
