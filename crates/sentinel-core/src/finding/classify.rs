use std::fmt;

use colored::Color;
use serde::{Serialize, Serializer};

use super::{Finding, FindingKind, RawFinding};

/// Canonical severity of a finding.
///
/// Unknown vocabulary never fails: it lands in [`Severity::Unrecognized`] with the
/// lowest display priority so the backend can grow new levels without breaking us.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unrecognized(String),
}

impl Severity {
    /// Parse a raw severity value. Absent or blank values default to `Low`.
    pub fn parse(raw: Option<&str>) -> Self {
        let value = match raw.map(str::trim) {
            Some(value) if !value.is_empty() => value.to_uppercase(),
            _ => return Self::Low,
        };
        match value.as_str() {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "MEDIUM" | "MED" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Unrecognized(value),
        }
    }

    /// Sort key: lower ranks are shown first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Unrecognized(_) => 4,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unrecognized(value) => value,
        }
    }

    pub fn theme(&self) -> Theme {
        match self {
            Self::Critical | Self::High => Theme::Red,
            Self::Medium => Theme::Orange,
            Self::Low => Theme::Yellow,
            Self::Unrecognized(_) => Theme::Neutral,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Display theme attached to a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Red,
    Orange,
    Yellow,
    Neutral,
}

impl Theme {
    pub fn key(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Neutral => "neutral",
        }
    }

    /// Terminal colour used by the human-readable report.
    pub fn color(self) -> Color {
        match self {
            Self::Red => Color::Red,
            Self::Orange => Color::TrueColor {
                r: 249,
                g: 115,
                b: 22,
            },
            Self::Yellow => Color::Yellow,
            Self::Neutral => Color::BrightBlack,
        }
    }
}

/// Severity of a wire finding. `risk_level` wins over `severity` when both are set.
pub fn classify(raw: &RawFinding) -> Severity {
    let value = [raw.risk_level.as_deref(), raw.severity.as_deref()]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty());
    Severity::parse(value)
}

/// Category of a wire finding, taken from whichever label field is present.
pub fn categorize(raw: &RawFinding) -> FindingKind {
    fn present(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    if let Some(label) = present(&raw.clause_type) {
        FindingKind::Clause(label)
    } else if let Some(label) = present(&raw.vulnerability_type) {
        FindingKind::Vulnerability(label)
    } else if let Some(label) = present(&raw.pii_type) {
        FindingKind::Pii(label)
    } else {
        FindingKind::Unlabeled
    }
}

pub fn normalize(raw: RawFinding) -> Finding {
    let severity = classify(&raw);
    let kind = categorize(&raw);
    Finding {
        severity,
        kind,
        excerpt: raw.excerpt.filter(|e| !e.trim().is_empty()),
        recommendation: raw.recommendation.filter(|r| !r.trim().is_empty()),
    }
}
