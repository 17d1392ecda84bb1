//! Session state: phases, the mutable session record, and read-only snapshots.
//!
//! [`UploadSession`] is owned by [`crate::controller::UploadController`] and
//! never handed out. Callers see [`SessionSnapshot`]s instead: plain values
//! that can be cloned into a render loop or serialised as JSON.

use crate::error::SessionError;
use crate::file::SelectedFile;
use crate::progress::{stage_for_percent, Stage};
use crate::scheduler::PollHandle;
use crate::service::TaskId;
use serde::Serialize;
use std::fmt;
use tokio::task::JoinHandle;

/// Shown while the upload request is in flight.
pub const UPLOADING_MESSAGE: &str = "Uploading file to server…";

/// Shown once the service reports completion.
pub const COMPLETED_MESSAGE: &str = "Translation complete.";

/// Fallback when an upload fails without a `detail` from the service.
pub const UPLOAD_FAILED_MESSAGE: &str = "An error occurred while uploading the file.";

/// A status check itself failed (transport error, non-success response).
pub const STATUS_CHECK_FAILED_MESSAGE: &str = "An error occurred while checking the status.";

/// The service reported `failed` without an `error` string.
pub const PROCESSING_FAILED_MESSAGE: &str = "An error occurred during processing.";

/// Fetching the translated document failed.
pub const DOWNLOAD_FAILED_MESSAGE: &str = "An error occurred while downloading.";

/// Where the session is in the upload → poll → download workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No file selected. Initial state and the state after `reset`.
    #[default]
    Idle,
    /// A file passed validation; the upload starts after a short delay.
    FileSelected,
    /// The upload request is in flight.
    Uploading,
    /// The service accepted the file; status is checked periodically.
    Polling,
    /// The translated document is ready to download.
    Completed,
    /// Upload, status check, or processing failed.
    Failed,
}

impl Phase {
    /// `Completed` and `Failed` are only left through `reset`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Phases in which the service has issued a task id (if submission succeeded).
    pub fn has_task(&self) -> bool {
        matches!(self, Phase::Polling | Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "Idle",
            Phase::FileSelected => "FileSelected",
            Phase::Uploading => "Uploading",
            Phase::Polling => "Polling",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Read-only view of the session, published on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub progress_percent: u8,
    /// Coarse label derived from `progress_percent`; only set while polling.
    pub stage: Option<Stage>,
    pub last_message: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub task_id: Option<TaskId>,
    /// The most recent surfaced error, cleared by `reset` and by a new selection.
    #[serde(skip)]
    pub error: Option<SessionError>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        UploadSession::default().snapshot()
    }
}

/// Something the observer should hear about once the lock is released.
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    PhaseChanged { from: Phase, to: Phase },
    Progress { percent: u8, stage: Stage, message: String },
    Error(SessionError),
}

/// The controller's mutable session record.
#[derive(Default)]
pub(crate) struct UploadSession {
    pub(crate) selected_file: Option<SelectedFile>,
    pub(crate) task_id: Option<TaskId>,
    pub(crate) phase: Phase,
    pub(crate) progress_percent: u8,
    pub(crate) last_message: String,
    pub(crate) last_error: Option<SessionError>,
    pub(crate) poll_handle: Option<PollHandle>,
    pub(crate) submit_task: Option<JoinHandle<()>>,
    /// Bumped on every reset; work started for an older generation is stale.
    pub(crate) generation: u64,
    /// Sequence number of the last status response applied.
    pub(crate) last_applied_seq: u64,
}

impl UploadSession {
    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            progress_percent: self.progress_percent,
            stage: (self.phase == Phase::Polling).then(|| stage_for_percent(self.progress_percent)),
            last_message: self.last_message.clone(),
            file_name: self.selected_file.as_ref().map(|f| f.name.clone()),
            file_size: self.selected_file.as_ref().map(SelectedFile::size),
            task_id: self.task_id.clone(),
            error: self.last_error.clone(),
        }
    }

    pub(crate) fn transition(&mut self, to: Phase, events: &mut Vec<SessionEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        if from == Phase::Polling {
            self.cancel_poll();
        }
        self.phase = to;
        events.push(SessionEvent::PhaseChanged { from, to });
        debug_assert!(self.invariants_hold(), "invariants broken entering {to}");
    }

    /// Record a terminal failure: message, error, and the move to `Failed`.
    pub(crate) fn fail(&mut self, error: SessionError, message: String, events: &mut Vec<SessionEvent>) {
        debug_assert!(error.is_terminal(), "{error:?} cannot end a session");
        self.last_message = message;
        self.last_error = Some(error.clone());
        self.transition(Phase::Failed, events);
        events.push(SessionEvent::Error(error));
    }

    /// Stop the poll task, if any.
    pub(crate) fn cancel_poll(&mut self) {
        if let Some(handle) = self.poll_handle.take() {
            handle.cancel();
        }
    }

    /// Cancel all background work and return to a pristine `Idle` session.
    pub(crate) fn teardown(&mut self, events: &mut Vec<SessionEvent>) {
        self.cancel_poll();
        if let Some(task) = self.submit_task.take() {
            task.abort();
        }
        let from = self.phase;
        let generation = self.generation.wrapping_add(1);
        *self = UploadSession {
            generation,
            ..UploadSession::default()
        };
        if from != Phase::Idle {
            events.push(SessionEvent::PhaseChanged {
                from,
                to: Phase::Idle,
            });
        }
    }

    /// `true` while a poll task is live.
    pub(crate) fn poll_active(&self) -> bool {
        self.poll_handle.as_ref().is_some_and(PollHandle::is_active)
    }

    /// The structural invariants of a session:
    ///
    /// * a task id only exists in phases that follow a successful submission,
    ///   and `Polling`/`Completed` always have one;
    /// * a poll handle exists exactly while `Polling`;
    /// * every phase past `Idle` has a selected file.
    pub(crate) fn invariants_hold(&self) -> bool {
        // Failed keeps the task id only if submission got that far.
        let task_ok = match self.phase {
            Phase::Failed => true,
            phase if phase.has_task() => self.task_id.is_some(),
            _ => self.task_id.is_none(),
        };
        let poll_ok = self.poll_handle.is_some() == (self.phase == Phase::Polling);
        let file_ok = (self.phase == Phase::Idle) || self.selected_file.is_some();
        task_ok && poll_ok && file_ok
    }
}
