pub mod error;
pub mod finding;
pub mod history;
pub mod job;
pub mod report;
pub mod session;

pub use error::ClientError;
pub use finding::{Finding, FindingKind, RawFinding, Severity, SeverityCounts, Theme};
pub use history::{sort_newest_first, HistoryEntry};
pub use job::{
    AnalysisBackend, AnalysisMode, AnalysisRequest, AnalysisResult, CancellationToken,
    ClientSettings, HealthStatus, HttpBackend, JobId, JobSnapshot, JobStatus, PollPolicy,
    RawReport, ScoreBand, Submission,
};
pub use report::{render_result, OutputFormat};
pub use session::{SessionDriver, SessionState, UploadSession};
