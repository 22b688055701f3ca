//! Findings as reported by the analysis service and their normalized form.

pub mod aggregate;
pub mod classify;

use serde::{Deserialize, Serialize};

pub use aggregate::{aggregate, count_by_severity, sort_by_severity, Aggregated, SeverityCounts};
pub use classify::{Severity, Theme};

/// Finding exactly as it appears on the wire.
///
/// The backend names the severity `risk_level` or `severity` and the category
/// `clause_type`, `vulnerability_type` or `pii_type` depending on the analysis mode.
/// Nothing outside [`classify`] should read these fields directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinding {
    pub risk_level: Option<String>,
    pub severity: Option<String>,
    pub clause_type: Option<String>,
    pub vulnerability_type: Option<String>,
    pub pii_type: Option<String>,
    pub excerpt: Option<String>,
    pub recommendation: Option<String>,
}

/// Category label of a finding, tagged by the mode that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", content = "label", rename_all = "snake_case")]
pub enum FindingKind {
    Clause(String),
    Vulnerability(String),
    Pii(String),
    Unlabeled,
}

impl FindingKind {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Clause(_) => "clause",
            Self::Vulnerability(_) => "vulnerability",
            Self::Pii(_) => "pii",
            Self::Unlabeled => "unlabeled",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Clause(label) | Self::Vulnerability(label) | Self::Pii(label) => label,
            Self::Unlabeled => "Issue",
        }
    }
}

/// A finding after boundary normalization. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub excerpt: Option<String>,
    pub recommendation: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, kind: FindingKind) -> Self {
        Self {
            severity,
            kind,
            excerpt: None,
            recommendation: None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.severity.theme()
    }
}

impl From<RawFinding> for Finding {
    fn from(raw: RawFinding) -> Self {
        classify::normalize(raw)
    }
}
