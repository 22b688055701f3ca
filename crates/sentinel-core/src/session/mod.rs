//! Upload/result lifecycle: `idle → submitting → in_progress → complete | failed → idle`.

mod driver;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::job::{AnalysisRequest, AnalysisResult, CancellationToken, JobId, RawReport, Submission};

pub use driver::SessionDriver;

/// Observable state of one upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Submitting,
    InProgress { job_id: JobId, progress: u8 },
    Complete(Arc<AnalysisResult>),
    Failed(ClientError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::InProgress { .. } => "in_progress",
            Self::Complete(_) => "complete",
            Self::Failed(_) => "failed",
        }
    }

    /// A submission or poll sequence is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Submitting | Self::InProgress { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Failed(_))
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Complete(result) => Some(result.as_ref()),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::InProgress { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// Message shown to the user in the failed state.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Failed(err) => Some(err.user_message()),
            _ => None,
        }
    }
}

/// Whether an event changed the session or was discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    Stale,
}

/// Handed out by [`UploadSession::begin_submit`]; identifies one submission attempt.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub generation: u64,
    pub request: Arc<AnalysisRequest>,
    pub cancel: CancellationToken,
}

/// Pure state machine. All transport happens in [`SessionDriver`].
///
/// The current job id is the only state shared between the submit and poll
/// paths; every poll event is checked against it before being applied.
#[derive(Debug)]
pub struct UploadSession {
    state: SessionState,
    selection: Option<Arc<AnalysisRequest>>,
    current_job: Option<JobId>,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            selection: None,
            current_job: None,
            generation: 0,
            cancel: None,
        }
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selection(&self) -> Option<&AnalysisRequest> {
        self.selection.as_deref()
    }

    pub fn current_job(&self) -> Option<&JobId> {
        self.current_job.as_ref()
    }

    /// Select the file to analyse. Only possible while idle.
    pub fn select_file(&mut self, request: AnalysisRequest) -> bool {
        if self.state != SessionState::Idle {
            warn!(state = self.state.name(), "file selection ignored outside idle state");
            return false;
        }
        self.selection = Some(Arc::new(request));
        true
    }

    /// `idle → submitting`. Returns `None` without a selected file or while not idle.
    pub fn begin_submit(&mut self) -> Option<SubmitTicket> {
        if self.state != SessionState::Idle {
            warn!(state = self.state.name(), "submit ignored; session not idle");
            return None;
        }
        let request = Arc::clone(self.selection.as_ref()?);

        self.generation += 1;
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.current_job = None;
        self.state = SessionState::Submitting;
        debug!(generation = self.generation, filename = %request.filename, "submitting");

        Some(SubmitTicket {
            generation: self.generation,
            request,
            cancel,
        })
    }

    /// Apply the answer of the submit call.
    pub fn on_submitted(
        &mut self,
        generation: u64,
        outcome: Result<Submission, ClientError>,
    ) -> Applied {
        if generation != self.generation || self.state != SessionState::Submitting {
            debug!(generation, current = self.generation, "discarding stale submit response");
            return Applied::Stale;
        }
        match outcome {
            Ok(Submission::Completed(report)) => self.complete(report),
            Ok(Submission::Accepted(job_id)) => {
                info!(%job_id, "tracking analysis job");
                self.current_job = Some(job_id.clone());
                self.state = SessionState::InProgress {
                    job_id,
                    progress: 0,
                };
            }
            Err(err) => self.fail(err),
        }
        Applied::Updated
    }

    /// Record observed progress. Regressions are ignored, never treated as errors.
    pub fn on_progress(&mut self, job_id: &JobId, progress: u8) -> Applied {
        if !self.is_live(job_id) {
            return Applied::Stale;
        }
        if let SessionState::InProgress {
            progress: current, ..
        } = &mut self.state
        {
            *current = (*current).max(progress.min(100));
        }
        Applied::Updated
    }

    /// `in_progress → complete` once the report has been fetched.
    pub fn on_report(&mut self, job_id: &JobId, report: RawReport) -> Applied {
        if !self.is_live(job_id) {
            return Applied::Stale;
        }
        self.complete(report);
        Applied::Updated
    }

    /// `in_progress → failed`.
    pub fn on_job_failed(&mut self, job_id: &JobId, err: ClientError) -> Applied {
        if !self.is_live(job_id) {
            return Applied::Stale;
        }
        self.fail(err);
        Applied::Updated
    }

    /// Back to `idle`: stops any polling and clears file, job, progress and result.
    pub fn reset(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.generation += 1;
        self.selection = None;
        self.current_job = None;
        self.state = SessionState::Idle;
        debug!(generation = self.generation, "session reset");
    }

    fn is_live(&self, job_id: &JobId) -> bool {
        let live = matches!(&self.state, SessionState::InProgress { job_id: current, .. } if current == job_id)
            && self.current_job.as_ref() == Some(job_id);
        if !live {
            debug!(%job_id, "discarding response for job that is no longer current");
        }
        live
    }

    fn complete(&mut self, report: RawReport) {
        let (mode, filename) = match &self.selection {
            Some(request) => (Some(request.mode), Some(request.filename.as_str())),
            None => (None, None),
        };
        let result = AnalysisResult::from_report(report, mode, filename);
        info!(
            filename = %result.filename,
            score = result.score,
            findings = result.findings.len(),
            "analysis complete"
        );
        self.state = SessionState::Complete(Arc::new(result));
        self.cancel = None;
    }

    fn fail(&mut self, err: ClientError) {
        warn!(error = %err, "analysis attempt failed");
        self.state = SessionState::Failed(err);
        self.cancel = None;
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
