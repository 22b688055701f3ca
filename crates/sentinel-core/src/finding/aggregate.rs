use serde::Serialize;

use super::{Finding, Severity};

/// Per-bucket counts. `high` includes `CRITICAL`; `medium` merges `MED` and `MEDIUM`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unrecognized: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.unrecognized
    }

    fn record(&mut self, severity: &Severity) {
        match severity {
            Severity::Critical | Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Unrecognized(_) => self.unrecognized += 1,
        }
    }
}

/// Sorted findings plus their bucket counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregated {
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
}

/// Copy of `findings` ordered by canonical severity. Equal ranks keep input order.
pub fn sort_by_severity(findings: &[Finding]) -> Vec<Finding> {
    let mut sorted = findings.to_vec();
    // `sort_by_key` is stable.
    sorted.sort_by_key(|finding| finding.severity.rank());
    sorted
}

pub fn count_by_severity(findings: &[Finding]) -> SeverityCounts {
    findings
        .iter()
        .fold(SeverityCounts::default(), |mut counts, finding| {
            counts.record(&finding.severity);
            counts
        })
}

pub fn aggregate(findings: &[Finding]) -> Aggregated {
    Aggregated {
        findings: sort_by_severity(findings),
        counts: count_by_severity(findings),
    }
}
