use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{AnalysisBackend, CancellationToken, ClientSettings, JobId, JobSnapshot, JobStatus, RawReport};
use crate::error::ClientError;

/// How a job is polled until it reaches a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Consecutive failed status requests that end the job. Values below 1 act as 1.
    pub max_consecutive_failures: u32,
    /// Optional limit on the whole polling phase.
    pub max_duration: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_consecutive_failures: 3,
            max_duration: None,
        }
    }
}

impl From<&ClientSettings> for PollPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            interval: settings.poll_interval,
            max_consecutive_failures: settings.max_poll_failures,
            max_duration: settings.max_poll_duration,
        }
    }
}

/// How a polling phase ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Status reached `complete` and the report was fetched.
    Completed(RawReport),
    Failed(ClientError),
    /// The token was cancelled; nothing further must be applied.
    Cancelled,
}

/// Poll `job_id` until it reaches a terminal status, then fetch its report.
///
/// `on_update` sees every status answer in issue order. Cancellation is observed
/// at every suspension point; once it fires, no further callback runs.
pub async fn poll_until_terminal<B, F>(
    backend: &B,
    job_id: &JobId,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_update: F,
) -> PollOutcome
where
    B: AnalysisBackend + ?Sized,
    F: FnMut(&JobSnapshot),
{
    let started = Instant::now();
    let max_failures = policy.max_consecutive_failures.max(1);
    let mut failures = 0u32;

    loop {
        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            answer = backend.status(job_id) => answer,
        };
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        match answer {
            Ok(snapshot) => {
                failures = 0;
                debug!(%job_id, status = ?snapshot.status, progress = snapshot.progress, "poll");
                on_update(&snapshot);
                match snapshot.status {
                    JobStatus::Complete => {
                        info!(%job_id, "analysis job complete; fetching report");
                        let report = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return PollOutcome::Cancelled,
                            report = backend.report(job_id) => report,
                        };
                        return match report {
                            Ok(report) => PollOutcome::Completed(report),
                            Err(err) => PollOutcome::Failed(err),
                        };
                    }
                    JobStatus::Error => {
                        warn!(%job_id, reason = ?snapshot.error, "analysis job failed");
                        return PollOutcome::Failed(ClientError::JobFailed {
                            job_id: job_id.to_string(),
                            reason: snapshot.error,
                        });
                    }
                    JobStatus::Queued | JobStatus::Processing | JobStatus::Unknown => {}
                }
            }
            Err(err) => {
                failures += 1;
                warn!(%job_id, failures, error = %err, "status poll failed");
                if failures >= max_failures {
                    return PollOutcome::Failed(err);
                }
            }
        }

        if let Some(limit) = policy.max_duration {
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return PollOutcome::Failed(ClientError::PollTimeout {
                    job_id: job_id.to_string(),
                    elapsed_secs: elapsed.as_secs(),
                });
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = sleep(policy.interval) => {}
        }
    }
}
