//! # pdf-translate-client
//!
//! Client for a remote PDF translation service: pick a PDF, upload it, follow
//! the service's progress and download the translated document.
//!
//! ## Why this crate?
//!
//! Translating a PDF server-side takes minutes, so the service works
//! asynchronously: an upload returns a task id, the client checks the task's
//! status periodically, and the result is fetched once it is ready. This crate
//! wraps that protocol in a single state machine that handles the timing,
//! cancellation and stale-response rules so a UI (or the bundled CLI) only has
//! to render snapshots.
//!
//! ## Session Overview
//!
//! ```text
//!           select_file (valid)       submit_delay            task id
//!   Idle ───────────────────▶ FileSelected ───────▶ Uploading ───────▶ Polling
//!    ▲                                                  │                 │
//!    │                                         submit error     completed │ failed / check error
//!    │                                                  ▼                 ▼
//!    └──────────────── reset (from any phase) ───── Failed ◀──┐     Completed ─▶ download
//!                                                             └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_translate_client::{ClientConfig, HttpService, Phase, SelectedFile, UploadController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let service = Arc::new(HttpService::new(&config)?);
//!     let controller = UploadController::new(service, config);
//!
//!     controller.select_file(SelectedFile::from_path("paper.pdf").await?)?;
//!     let done = controller.wait_until_settled().await;
//!     match done.phase {
//!         Phase::Completed => {
//!             let path = controller.download().await?.save_to(".").await?;
//!             eprintln!("saved {}", path.display());
//!         }
//!         _ => eprintln!("failed: {}", done.last_message),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-translate-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod file;
pub mod progress;
pub mod scheduler;
pub mod service;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ClientConfig, ClientConfigBuilder, ACCEPTED_EXTENSION, ARTIFACT_PREFIX, DEFAULT_BASE_URL,
    DEFAULT_POLL_INTERVAL, DEFAULT_SUBMIT_DELAY, MAX_UPLOAD_BYTES,
};
pub use controller::UploadController;
pub use error::{ClientError, ServiceError, SessionError, ValidationError};
pub use file::{format_file_size, validate_file, Artifact, FileRules, SelectedFile};
pub use progress::{stage_for_percent, NoopObserver, ObserverHandle, SessionObserver, Stage};
pub use service::{
    HealthReport, HttpService, StatusSnapshot, Submission, TaskId, TaskStatus, TranslationService,
};
pub use session::{Phase, SessionSnapshot};
