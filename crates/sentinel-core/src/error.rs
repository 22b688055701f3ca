use thiserror::Error;

/// Failures surfaced by the job client and the upload session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network unreachable, connection reset, timeout or a non-success status without detail.
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered but the body could not be decoded.
    #[error("malformed response from analysis service: {0}")]
    Decode(String),
    /// Structured error detail reported by the backend.
    #[error("{detail}")]
    Backend { status: u16, detail: String },
    /// The job reached the `error` status while polling.
    #[error("analysis failed")]
    JobFailed {
        job_id: String,
        reason: Option<String>,
    },
    /// The report endpoint answered before the job finished.
    #[error("report for job `{job_id}` is not ready yet")]
    ReportNotReady { job_id: String },
    /// Polling exceeded the configured maximum duration.
    #[error("analysis of job `{job_id}` did not finish within {elapsed_secs}s")]
    PollTimeout { job_id: String, elapsed_secs: u64 },
    /// Client-side extension filter rejected the selected file.
    #[error("file `{filename}` is not accepted for {mode}; expected one of: {expected}")]
    UnsupportedFile {
        filename: String,
        mode: String,
        expected: String,
    },
}

impl ClientError {
    /// Text shown to the user when an attempt ends in the failed state.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Decode(_) => {
                "Could not reach the analysis service. Check the connection and try again.".into()
            }
            Self::Backend { detail, .. } => detail.clone(),
            Self::JobFailed { .. } => "Analysis failed.".into(),
            other => other.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
