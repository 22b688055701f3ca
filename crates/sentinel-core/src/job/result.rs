use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AnalysisMode;
use crate::finding::{aggregate, Finding, RawFinding, SeverityCounts};

/// Report body as returned by the analyze or report endpoints.
///
/// Legal and vulnerability reports carry `findings`; PII reports carry `pii_instances`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReport {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub findings: Option<Vec<RawFinding>>,
    #[serde(default)]
    pub pii_instances: Option<Vec<RawFinding>>,
}

impl RawReport {
    /// True when the body carries at least one findings collection, even an empty one.
    pub fn is_report_shaped(&self) -> bool {
        self.findings.is_some() || self.pii_instances.is_some()
    }

    fn relevant_findings(&mut self, mode: AnalysisMode) -> Vec<RawFinding> {
        match mode {
            AnalysisMode::PiiMasking => self
                .pii_instances
                .take()
                .or_else(|| self.findings.take())
                .unwrap_or_default(),
            AnalysisMode::LegalRiskScoring | AnalysisMode::VulnerabilityDetection => {
                self.findings.take().unwrap_or_default()
            }
        }
    }
}

/// Score thresholds for the display band. Both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub medium: i64,
    pub high: i64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            medium: 30,
            high: 60,
        }
    }
}

/// Qualitative band of the overall score (0 = safest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Low,
    Medium,
    High,
}

impl ScoreBand {
    pub fn from_score(score: i64) -> Self {
        Self::from_score_with_thresholds(score, &ScoreThresholds::default())
    }

    pub fn from_score_with_thresholds(score: i64, thresholds: &ScoreThresholds) -> Self {
        if score > thresholds.high {
            Self::High
        } else if score > thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Classified, sorted result of one completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub filename: String,
    pub mode: AnalysisMode,
    pub score: i64,
    pub band: ScoreBand,
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
}

impl AnalysisResult {
    /// Normalize a report body for presentation.
    ///
    /// `mode` is the mode the user asked for; when unknown the report's own
    /// `selection` is used, then legal risk scoring.
    pub fn from_report(
        mut report: RawReport,
        mode: Option<AnalysisMode>,
        fallback_filename: Option<&str>,
    ) -> Self {
        let reported_mode = report
            .selection
            .as_deref()
            .and_then(|selection| selection.parse::<AnalysisMode>().ok());
        if let (Some(requested), Some(reported)) = (mode, reported_mode) {
            if requested != reported {
                debug!(%requested, %reported, "report mode differs from requested mode");
            }
        }
        let mode = mode
            .or(reported_mode)
            .unwrap_or(AnalysisMode::LegalRiskScoring);

        let findings: Vec<Finding> = report
            .relevant_findings(mode)
            .into_iter()
            .map(Finding::from)
            .collect();
        let aggregated = aggregate(&findings);

        let score = report
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.round() as i64)
            .unwrap_or(0);

        let filename = report
            .filename
            .filter(|name| !name.trim().is_empty())
            .or_else(|| fallback_filename.map(str::to_string))
            .unwrap_or_default();

        Self {
            filename,
            mode,
            score,
            band: ScoreBand::from_score(score),
            findings: aggregated.findings,
            counts: aggregated.counts,
        }
    }

    /// True when the analysis produced no findings at all.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{FindingKind, Severity};
    use serde_json::json;

    #[test]
    fn legal_report_is_sorted_and_counted() {
        let report: RawReport = serde_json::from_value(json!({
            "filename": "nda.pdf",
            "score": 65,
            "summary": {"high": 1, "med": 1, "low": 1},
            "findings": [
                {"risk_level": "LOW", "clause_type": "Governing Law"},
                {"risk_level": "HIGH", "clause_type": "IP Assignment"},
                {"risk_level": "MED", "clause_type": "Termination"}
            ]
        }))
        .unwrap();

        let result = AnalysisResult::from_report(report, Some(AnalysisMode::LegalRiskScoring), None);
        assert_eq!(result.filename, "nda.pdf");
        assert_eq!(result.band, ScoreBand::High);
        let labels: Vec<&str> = result.findings.iter().map(|f| f.kind.label()).collect();
        assert_eq!(labels, vec!["IP Assignment", "Termination", "Governing Law"]);
        assert_eq!(result.counts.total(), 3);
        assert!(!result.is_clean());
    }

    #[test]
    fn pii_mode_uses_pii_instances_only() {
        let report: RawReport = serde_json::from_value(json!({
            "filename": "cv.pdf",
            "selection": "pii_masking",
            "score": 12.6,
            "findings": [{"severity": "HIGH", "clause_type": "ignored"}],
            "pii_instances": [{"severity": "low", "pii_type": "EMAIL"}]
        }))
        .unwrap();

        let result = AnalysisResult::from_report(report, None, None);
        assert_eq!(result.mode, AnalysisMode::PiiMasking);
        assert_eq!(result.score, 13);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].kind, FindingKind::Pii("EMAIL".into()));
        assert_eq!(result.findings[0].severity, Severity::Low);
    }

    #[test]
    fn pii_mode_falls_back_when_instances_are_absent() {
        let report: RawReport = serde_json::from_value(json!({
            "findings": [{"risk_level": "MED", "pii_type": "SSN"}]
        }))
        .unwrap();
        let result =
            AnalysisResult::from_report(report, Some(AnalysisMode::PiiMasking), Some("id.pdf"));
        assert_eq!(result.filename, "id.pdf");
        assert_eq!(result.counts.medium, 1);
    }

    #[test]
    fn empty_report_is_clean() {
        let result = AnalysisResult::from_report(
            RawReport::default(),
            Some(AnalysisMode::VulnerabilityDetection),
            Some("app.py"),
        );
        assert!(result.is_clean());
        assert_eq!(result.counts, SeverityCounts::default());
        assert_eq!(result.band, ScoreBand::Low);
    }

    #[test]
    fn score_band_bounds_are_exclusive() {
        assert_eq!(ScoreBand::from_score(30), ScoreBand::Low);
        assert_eq!(ScoreBand::from_score(31), ScoreBand::Medium);
        assert_eq!(ScoreBand::from_score(60), ScoreBand::Medium);
        assert_eq!(ScoreBand::from_score(61), ScoreBand::High);
    }
}
