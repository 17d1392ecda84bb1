//! Progress reporting: coarse stage labels and the observer callback trait.
//!
//! The service reports a bare percentage. [`stage_for_percent`] turns it into
//! one of three labels matching the service's pipeline (recognise text,
//! translate, rebuild the PDF). The label is cosmetic: the controller never
//! branches on it.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to receive events as the
//! session moves through its phases.
//!
//! # Example
//!
//! ```rust
//! use pdf_translate_client::{ClientConfig, Phase, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     transitions: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_phase_change(&self, from: Phase, to: Phase) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{from} -> {to}");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { transitions: AtomicUsize::new(0) });
//! let config = ClientConfig::builder()
//!     .observer(observer as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::SessionError;
use crate::session::Phase;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// First percentage shown as [`Stage::Translating`].
pub const TRANSLATING_FROM_PERCENT: u8 = 40;

/// First percentage shown as [`Stage::Rebuilding`].
pub const REBUILDING_FROM_PERCENT: u8 = 70;

/// Coarse, user-facing label for a processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `[0, 40)`: OCR / text recognition.
    Recognizing,
    /// `[40, 70)`: machine translation.
    Translating,
    /// `[70, 100]`: rebuilding the translated PDF.
    Rebuilding,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Recognizing => "Recognizing text…",
            Stage::Translating => "Translating…",
            Stage::Rebuilding => "Rebuilding document…",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a progress percentage to its stage label.
pub fn stage_for_percent(percent: u8) -> Stage {
    if percent < TRANSLATING_FROM_PERCENT {
        Stage::Recognizing
    } else if percent < REBUILDING_FROM_PERCENT {
        Stage::Translating
    } else {
        Stage::Rebuilding
    }
}

/// Receives session events from the controller.
///
/// Methods are called after the session state has been updated and outside
/// the controller's lock, so implementations may read
/// [`crate::controller::UploadController::snapshot`] or call
/// [`reset`](crate::controller::UploadController::reset) freely. Events arrive
/// one at a time, in the order the session changed. They run on whichever
/// Tokio task drove the transition and must not block.
pub trait SessionObserver: Send + Sync {
    /// The session moved from one phase to another.
    fn on_phase_change(&self, from: Phase, to: Phase) {
        let _ = (from, to);
    }

    /// A non-terminal status snapshot was applied while polling.
    ///
    /// # Arguments
    /// * `percent`: displayed progress, 0–100
    /// * `stage`: label derived from `percent`
    /// * `message`: the service's free-text status (may be empty)
    fn on_progress(&self, percent: u8, stage: Stage, message: &str) {
        let _ = (percent, stage, message);
    }

    /// An error was surfaced (validation, terminal failure, or download).
    fn on_error(&self, error: &SessionError) {
        let _ = error;
    }
}

/// Observer that ignores every event.
///
/// Behaves the same as leaving [`crate::config::ClientConfig::observer`] unset.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ObserverHandle = Arc<dyn SessionObserver>;
