mod cancel;
pub mod http;
pub mod poll;
mod result;
mod settings;

use std::{fmt, path::Path, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ClientError;
use crate::history::HistoryEntry;

pub use cancel::CancellationToken;
pub use http::HttpBackend;
pub use poll::{poll_until_terminal, PollOutcome, PollPolicy};
pub use result::{AnalysisResult, RawReport, ScoreBand, ScoreThresholds};
pub use settings::ClientSettings;

/// Analysis performed by the backend on an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    LegalRiskScoring,
    VulnerabilityDetection,
    PiiMasking,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 3] = [
        Self::LegalRiskScoring,
        Self::VulnerabilityDetection,
        Self::PiiMasking,
    ];

    /// Wire value sent as the `selection` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LegalRiskScoring => "legal_risk_scoring",
            Self::VulnerabilityDetection => "vulnerability_detection",
            Self::PiiMasking => "pii_masking",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::LegalRiskScoring => "Identifies IP, non-compete, indemnification risks",
            Self::VulnerabilityDetection => "Scans code for security vulnerabilities",
            Self::PiiMasking => "Finds personally identifiable information",
        }
    }

    /// File extensions the upload filter lets through. Not a security boundary.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            Self::VulnerabilityDetection => &["pdf", "py", "js", "ts", "java", "sol"],
            Self::LegalRiskScoring | Self::PiiMasking => &["pdf"],
        }
    }

    pub fn accepts(self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.accepted_extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown analysis mode `{0}` (expected legal, vuln or pii)")]
pub struct ModeParseError(pub String);

impl FromStr for AnalysisMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "legal" | "legal_risk_scoring" => Ok(Self::LegalRiskScoring),
            "vuln" | "vulnerability" | "vulnerability_detection" => {
                Ok(Self::VulnerabilityDetection)
            }
            "pii" | "pii_masking" => Ok(Self::PiiMasking),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

/// One upload. Built on submit, dropped once the request has been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub filename: String,
    pub contents: Vec<u8>,
    pub mode: AnalysisMode,
    pub context_prompt: Option<String>,
}

impl AnalysisRequest {
    /// Build a request, applying the per-mode extension filter.
    pub fn new(
        filename: impl Into<String>,
        contents: Vec<u8>,
        mode: AnalysisMode,
    ) -> Result<Self, ClientError> {
        let filename = filename.into();
        if !mode.accepts(&filename) {
            return Err(ClientError::UnsupportedFile {
                filename,
                mode: mode.to_string(),
                expected: mode
                    .accepted_extensions()
                    .iter()
                    .map(|ext| format!(".{ext}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            });
        }
        Ok(Self {
            filename,
            contents,
            mode,
            context_prompt: None,
        })
    }

    /// Attach an optional context prompt; blank prompts are dropped.
    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.context_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Opaque job identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Error,
    /// Status values this client does not know; treated as still running.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// One answer of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireSnapshot")]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Always within 0..=100.
    pub progress: u8,
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(status: JobStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
            error: None,
        }
    }
}

#[derive(Deserialize)]
struct WireSnapshot {
    status: JobStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireSnapshot> for JobSnapshot {
    fn from(wire: WireSnapshot) -> Self {
        let progress = wire.progress.unwrap_or(0.0);
        let progress = if progress.is_finite() {
            progress.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        Self {
            status: wire.status,
            progress,
            error: wire.error.filter(|e| !e.trim().is_empty()),
        }
    }
}

/// Outcome of the submit call; the backend decides which contract applies.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Synchronous contract: the full result came back immediately.
    Completed(RawReport),
    /// Asynchronous contract: a job must be polled.
    Accepted(JobId),
}

/// Response of the backend health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Request/response contract of the analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Upload a file for analysis.
    async fn submit(&self, request: &AnalysisRequest) -> Result<Submission, ClientError>;

    /// Current status and progress of an asynchronous job.
    async fn status(&self, job_id: &JobId) -> Result<JobSnapshot, ClientError>;

    /// Full report of a finished job.
    async fn report(&self, job_id: &JobId) -> Result<RawReport, ClientError>;

    /// Rendered HTML report of a finished job, returned as-is.
    async fn report_html(&self, job_id: &JobId) -> Result<String, ClientError>;

    /// Past analyses in server order.
    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError>;

    async fn health(&self) -> Result<HealthStatus, ClientError>;
}
