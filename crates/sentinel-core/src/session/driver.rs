use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use super::{SessionState, UploadSession};
use crate::job::{
    poll_until_terminal, AnalysisBackend, AnalysisRequest, JobId, PollOutcome, PollPolicy,
};

/// Runs an [`UploadSession`] against a backend and publishes every state change.
///
/// Share it behind an `Arc` to call [`reset`](Self::reset) while
/// [`submit`](Self::submit) is suspended on the transport.
pub struct SessionDriver<B: ?Sized> {
    backend: Arc<B>,
    policy: PollPolicy,
    session: Mutex<UploadSession>,
    updates: watch::Sender<SessionState>,
}

impl<B: AnalysisBackend + ?Sized> SessionDriver<B> {
    pub fn new(backend: Arc<B>, policy: PollPolicy) -> Self {
        let (updates, _) = watch::channel(SessionState::Idle);
        Self {
            backend,
            policy,
            session: Mutex::new(UploadSession::new()),
            updates,
        }
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.with_session(|session| session.state().clone())
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.with_session(|session| session.current_job().cloned())
    }

    pub fn select_file(&self, request: AnalysisRequest) -> bool {
        self.update(|session| session.select_file(request))
    }

    pub fn reset(&self) {
        self.update(UploadSession::reset);
    }

    /// Run one submission to a terminal state and return the state it ended in.
    ///
    /// Ignored (returns the current state) without a selected file or while another
    /// submission is in flight. Returns early when the session is reset meanwhile.
    pub async fn submit(&self) -> SessionState {
        let Some(ticket) = self.update(UploadSession::begin_submit) else {
            return self.state();
        };

        let outcome = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => {
                debug!(generation = ticket.generation, "submission cancelled");
                return self.state();
            }
            outcome = self.backend.submit(&ticket.request) => outcome,
        };
        self.update(|session| session.on_submitted(ticket.generation, outcome));

        let Some(job_id) = self.live_job(ticket.generation) else {
            return self.state();
        };

        let outcome = poll_until_terminal(
            self.backend.as_ref(),
            &job_id,
            &self.policy,
            &ticket.cancel,
            |snapshot| {
                self.update(|session| session.on_progress(&job_id, snapshot.progress));
            },
        )
        .await;

        match outcome {
            PollOutcome::Completed(report) => {
                self.update(|session| session.on_report(&job_id, report));
            }
            PollOutcome::Failed(err) => {
                self.update(|session| session.on_job_failed(&job_id, err));
            }
            PollOutcome::Cancelled => debug!(%job_id, "polling cancelled"),
        }
        self.state()
    }

    /// Job to poll, if the submission of `generation` is still the live one.
    fn live_job(&self, generation: u64) -> Option<JobId> {
        self.with_session(|session| match session.state() {
            SessionState::InProgress { job_id, .. } if session.generation == generation => {
                Some(job_id.clone())
            }
            _ => None,
        })
    }

    fn with_session<R>(&self, f: impl FnOnce(&UploadSession) -> R) -> R {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    fn update<R>(&self, f: impl FnOnce(&mut UploadSession) -> R) -> R {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut session);
        self.updates.send_if_modified(|published| {
            if published == session.state() {
                false
            } else {
                *published = session.state().clone();
                true
            }
        });
        result
    }
}
