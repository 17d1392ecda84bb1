//! The upload session controller.
//!
//! [`UploadController`] owns the single live [`UploadSession`] and is the only
//! thing that mutates it. Three kinds of work run in the background on Tokio
//! tasks, each bound to the session *generation* it was started for:
//!
//! ```text
//! select_file ─▶ [submit task]  sleep(submit_delay) → submit()
//!                      │
//!                      ▼
//!               [poll task]     poll_status() now, then every poll_interval
//!                      │
//!                      ▼
//!               Completed ─▶ download()  (caller-driven)
//! ```
//!
//! `reset` bumps the generation and cancels both tasks, so a response that
//! arrives for an older generation is discarded instead of corrupting the new
//! session. Within one generation every status response carries the sequence
//! number of its tick; anything not newer than the last applied one is
//! dropped.
//!
//! Callers read state through [`UploadController::snapshot`] or
//! [`UploadController::subscribe`] and never see transport errors directly:
//! every failure becomes a [`SessionError`] plus `last_message`.

use crate::config::ClientConfig;
use crate::error::{ServiceError, SessionError};
use crate::file::{Artifact, SelectedFile};
use crate::progress::stage_for_percent;
use crate::scheduler::{spawn_poller, PollHandle};
use crate::service::{StatusSnapshot, Submission, TaskStatus, TranslationService};
use crate::session::{
    Phase, SessionEvent, SessionSnapshot, UploadSession, COMPLETED_MESSAGE,
    DOWNLOAD_FAILED_MESSAGE, PROCESSING_FAILED_MESSAGE, STATUS_CHECK_FAILED_MESSAGE,
    UPLOADING_MESSAGE, UPLOAD_FAILED_MESSAGE,
};
use std::collections::VecDeque;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Drives one upload → poll → download workflow at a time.
///
/// Cheap to clone; clones share the same session.
///
/// # Example
/// ```rust,no_run
/// use pdf_translate_client::{ClientConfig, HttpService, Phase, SelectedFile, UploadController};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::builder().base_url("http://localhost:8000").build()?;
/// let service = Arc::new(HttpService::new(&config)?);
/// let controller = UploadController::new(service, config);
///
/// controller.select_file(SelectedFile::from_path("paper.pdf").await?)?;
/// let done = controller.wait_until_settled().await;
/// if done.phase == Phase::Completed {
///     let artifact = controller.download().await?;
///     artifact.save_to(".").await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UploadController {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<dyn TranslationService>,
    config: ClientConfig,
    session: Mutex<UploadSession>,
    snapshots: watch::Sender<SessionSnapshot>,
    /// Observer events in the order their mutations were applied.
    pending: Mutex<VecDeque<SessionEvent>>,
    dispatching: AtomicBool,
}

impl fmt::Debug for UploadController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadController")
            .field("config", &self.inner.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl UploadController {
    pub fn new(service: Arc<dyn TranslationService>, config: ClientConfig) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                service,
                config,
                session: Mutex::new(UploadSession::default()),
                snapshots,
                pending: Mutex::new(VecDeque::new()),
                dispatching: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current state of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.snapshots.borrow().phase
    }

    pub fn progress_percent(&self) -> u8 {
        self.inner.snapshots.borrow().progress_percent
    }

    pub fn last_message(&self) -> String {
        self.inner.snapshots.borrow().last_message.clone()
    }

    /// Receive a new snapshot every time the session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a `Stream`, starting with the
    /// current snapshot.
    pub fn updates(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// `true` while the status poll task is running.
    pub fn poll_active(&self) -> bool {
        self.inner.lock().poll_active()
    }

    /// Offer a file to the session.
    ///
    /// Only allowed while `Idle`. A rejected file leaves the session `Idle`
    /// (with the reason in `last_message`) so another file can be offered
    /// straight away. An accepted file moves the session to `FileSelected`
    /// and the upload starts on its own after
    /// [`ClientConfig::submit_delay`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn select_file(&self, file: SelectedFile) -> Result<(), SessionError> {
        let rules = self.inner.config.file_rules();
        let weak = Arc::downgrade(&self.inner);

        self.inner.update(move |session, events| {
            if session.phase != Phase::Idle {
                return Err(SessionError::Busy {
                    phase: session.phase,
                });
            }

            if let Err(reason) = rules.check(&file.name, file.size()) {
                warn!("Rejected '{}': {}", file.name, reason);
                session.last_message = reason.to_string();
                let err = SessionError::Validation(reason);
                session.last_error = Some(err.clone());
                events.push(SessionEvent::Error(err.clone()));
                return Err(err);
            }

            info!("Selected '{}' ({} bytes)", file.name, file.size());
            session.selected_file = Some(file);
            session.last_message.clear();
            session.last_error = None;
            session.transition(Phase::FileSelected, events);

            let generation = session.generation;
            session.submit_task = Some(tokio::spawn(run_submission(weak, generation)));
            Ok(())
        })
    }

    /// Fetch the translated document. Only valid in `Completed`.
    ///
    /// A failed fetch does not leave `Completed`; call again to retry.
    pub async fn download(&self) -> Result<Artifact, SessionError> {
        let (task_id, name, generation) = {
            let session = self.inner.lock();
            match (&session.phase, &session.task_id, &session.selected_file) {
                (Phase::Completed, Some(task_id), Some(file)) => {
                    (task_id.clone(), file.name.clone(), session.generation)
                }
                _ => {
                    return Err(SessionError::NotReady {
                        phase: session.phase,
                    })
                }
            }
        };

        match self.inner.service.fetch_result(&task_id).await {
            Ok(content) => {
                self.inner.update(|session, _| {
                    if session.generation == generation && session.last_error.is_some() {
                        session.last_message = COMPLETED_MESSAGE.to_string();
                        session.last_error = None;
                    }
                });
                Ok(Artifact {
                    file_name: format!("{}{}", self.inner.config.artifact_prefix, name),
                    content,
                })
            }
            Err(e) => {
                warn!("Download of task {} failed: {}", task_id, e);
                let err = SessionError::Download {
                    message: DOWNLOAD_FAILED_MESSAGE.to_string(),
                };
                self.inner.update(|session, events| {
                    if session.generation == generation {
                        session.last_message = DOWNLOAD_FAILED_MESSAGE.to_string();
                        session.last_error = Some(err.clone());
                        events.push(SessionEvent::Error(err.clone()));
                    }
                });
                Err(err)
            }
        }
    }

    /// Tear the session down and return to `Idle`. Safe to call in any phase,
    /// any number of times.
    pub fn reset(&self) {
        self.inner.update(|session, events| {
            if session.phase != Phase::Idle {
                info!("Resetting session (was {})", session.phase);
            }
            session.teardown(events);
        });
    }

    /// Wait until the session is `Completed`, `Failed`, or `Idle`.
    ///
    /// Returns immediately if it already is.
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| s.phase.is_terminal() || s.phase == Phase::Idle)
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }
}

/// Releases the delivery flag even if an observer panics.
struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, UploadSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<SessionEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the session, publish the new snapshot, then notify the observer
    /// with the session lock released.
    ///
    /// Events are queued while the session lock is held, so the observer sees
    /// them in the same order the mutations happened even when several tasks
    /// update the session at once.
    fn update<R>(&self, f: impl FnOnce(&mut UploadSession, &mut Vec<SessionEvent>) -> R) -> R {
        let result = {
            let mut session = self.lock();
            let mut events = Vec::new();
            let result = f(&mut session, &mut events);
            let next = session.snapshot();
            self.snapshots.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
            if !events.is_empty() {
                self.pending().extend(events);
            }
            result
        };
        self.drain_events();
        result
    }

    /// Deliver queued events. Only one caller delivers at a time; anyone else
    /// (including an observer calling back into the controller) leaves its
    /// events for the active deliverer.
    fn drain_events(&self) {
        loop {
            if self
                .dispatching
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            let guard = DispatchGuard(&self.dispatching);
            loop {
                let next = self.pending().pop_front();
                match next {
                    Some(event) => self.dispatch(event),
                    None => break,
                }
            }
            drop(guard);
            // An event queued between the last pop and the release above
            // would otherwise wait for the next update.
            if self.pending().is_empty() {
                return;
            }
        }
    }

    fn dispatch(&self, event: SessionEvent) {
        match event {
            SessionEvent::PhaseChanged { from, to } => {
                info!("Session {} → {}", from, to);
                if let Some(observer) = &self.config.observer {
                    observer.on_phase_change(from, to);
                }
            }
            SessionEvent::Progress {
                percent,
                stage,
                message,
            } => {
                if let Some(observer) = &self.config.observer {
                    observer.on_progress(percent, stage, &message);
                }
            }
            SessionEvent::Error(err) => {
                if let Some(observer) = &self.config.observer {
                    observer.on_error(&err);
                }
            }
        }
    }

    fn apply_submission(self: &Arc<Self>, generation: u64, result: Result<Submission, ServiceError>) {
        let weak = Arc::downgrade(self);
        let interval = self.config.poll_interval;

        self.update(move |session, events| {
            if session.generation != generation || session.phase != Phase::Uploading {
                warn!("Discarding upload response for a session that was reset");
                return;
            }
            session.submit_task = None;

            match result {
                Ok(submission) => {
                    info!(
                        "Task {} accepted; checking status every {:?}",
                        submission.task_id, interval
                    );
                    session.task_id = Some(submission.task_id);
                    if let Some(message) = submission.message {
                        session.last_message = message;
                    }
                    session.last_applied_seq = 0;
                    session.poll_handle = Some(start_polling(weak, generation, interval));
                    session.transition(Phase::Polling, events);
                }
                Err(e) => {
                    warn!("Upload failed: {}", e);
                    let message = e
                        .detail()
                        .filter(|d| !d.trim().is_empty())
                        .map(str::to_owned)
                        .unwrap_or_else(|| UPLOAD_FAILED_MESSAGE.to_string());
                    session.fail(
                        SessionError::Submission {
                            message: message.clone(),
                        },
                        message,
                        events,
                    );
                }
            }
        });
    }

    async fn poll_once(&self, generation: u64, seq: u64) -> ControlFlow<()> {
        let task_id = {
            let session = self.lock();
            if session.generation != generation || session.phase != Phase::Polling {
                return ControlFlow::Break(());
            }
            match &session.task_id {
                Some(id) => id.clone(),
                None => return ControlFlow::Break(()),
            }
        };

        let result = self.service.poll_status(&task_id).await;
        self.apply_status(generation, seq, result)
    }

    fn apply_status(
        &self,
        generation: u64,
        seq: u64,
        result: Result<StatusSnapshot, ServiceError>,
    ) -> ControlFlow<()> {
        self.update(|session, events| {
            if session.generation != generation || session.phase != Phase::Polling {
                debug!(seq, "Discarding status response for a finished session");
                return ControlFlow::Break(());
            }
            if seq <= session.last_applied_seq {
                warn!(
                    seq,
                    last = session.last_applied_seq,
                    "Discarding out-of-order status response"
                );
                return ControlFlow::Continue(());
            }
            session.last_applied_seq = seq;

            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(timed_out = e.is_timeout(), "Status check failed: {}", e);
                    let message = STATUS_CHECK_FAILED_MESSAGE.to_string();
                    session.fail(
                        SessionError::StatusCheck {
                            message: message.clone(),
                        },
                        message,
                        events,
                    );
                    return ControlFlow::Break(());
                }
            };

            match snapshot.status {
                TaskStatus::Uploaded | TaskStatus::Processing => {
                    let reported = snapshot.percent();
                    if reported < session.progress_percent {
                        debug!(
                            reported,
                            shown = session.progress_percent,
                            "Service progress went backwards; keeping the higher value"
                        );
                    }
                    let percent = reported.max(session.progress_percent);
                    session.progress_percent = percent;
                    session.last_message = snapshot.message.unwrap_or_default();
                    events.push(SessionEvent::Progress {
                        percent,
                        stage: stage_for_percent(percent),
                        message: session.last_message.clone(),
                    });
                    ControlFlow::Continue(())
                }
                TaskStatus::Completed => {
                    session.progress_percent = 100;
                    session.last_message = COMPLETED_MESSAGE.to_string();
                    session.transition(Phase::Completed, events);
                    ControlFlow::Break(())
                }
                TaskStatus::Failed => {
                    let message = snapshot
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| PROCESSING_FAILED_MESSAGE.to_string());
                    session.fail(
                        SessionError::ServiceReportedFailure {
                            message: message.clone(),
                        },
                        message,
                        events,
                    );
                    ControlFlow::Break(())
                }
                TaskStatus::Unknown => {
                    debug!(seq, "Ignoring unrecognised task status");
                    ControlFlow::Continue(())
                }
            }
        })
    }
}

/// Wait out the submit delay, then upload the selected file.
async fn run_submission(inner: Weak<Inner>, generation: u64) {
    let Some(delay) = inner.upgrade().map(|i| i.config.submit_delay) else {
        return;
    };
    tokio::time::sleep(delay).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let file = inner.update(|session, events| {
        if session.generation != generation || session.phase != Phase::FileSelected {
            return None;
        }
        session.progress_percent = 0;
        session.last_message = UPLOADING_MESSAGE.to_string();
        session.transition(Phase::Uploading, events);
        session.selected_file.clone()
    });
    let Some(file) = file else {
        return;
    };

    let result = inner.service.submit(&file).await;
    inner.apply_submission(generation, result);
}

fn start_polling(inner: Weak<Inner>, generation: u64, interval: std::time::Duration) -> PollHandle {
    spawn_poller(interval, move |seq| {
        let inner = inner.clone();
        async move {
            match inner.upgrade() {
                Some(inner) => inner.poll_once(generation, seq).await,
                None => ControlFlow::Break(()),
            }
        }
    })
}
