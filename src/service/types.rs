//! Wire types for the translation service's JSON API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier the service assigns to a submitted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Body of a successful `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    pub task_id: TaskId,
    #[serde(default)]
    pub message: Option<String>,
}

/// Task status as reported by `GET /api/status/{task_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    /// Anything else. Treated as "no news" and ignored while polling.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One status-check response.
///
/// Unknown fields (`created_at`, `filename`, `result_path`, …) are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            progress: None,
            message: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Reported progress as a whole percentage: missing → 0, rounded,
    /// clamped to `0..=100`. NaN counts as missing.
    pub fn percent(&self) -> u8 {
        match self.progress {
            Some(p) if p.is_finite() => p.round().clamp(0.0, 100.0) as u8,
            _ => 0,
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Error body of a failed request: `{"detail": ...}`.
///
/// `detail` is usually a string but validation errors carry a list of
/// objects; anything non-string is kept as compact JSON.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(crate) fn into_detail(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
