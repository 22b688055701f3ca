use std::fmt::Write;

use colored::Colorize;
use serde::Serialize;

use crate::finding::{Finding, SeverityCounts};
use crate::job::{AnalysisMode, AnalysisResult, ScoreBand};

/// Format styles supported by the default renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from an `AnalysisResult` using the desired format.
pub fn render_result(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport::from(result))?),
    }
}

fn render_human(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "{} ({})", result.filename, mode_label(result.mode))?;
    // Only legal scoring produces a meaningful overall score.
    if result.mode == AnalysisMode::LegalRiskScoring {
        let score = result.score.to_string();
        let score = match result.band {
            ScoreBand::High => score.red().bold(),
            ScoreBand::Medium => score.yellow().bold(),
            ScoreBand::Low => score.green().bold(),
        };
        writeln!(out, "Risk Score: {score} ({:?})", result.band)?;
    }
    writeln!(out, "{}", pill_counts(&result.counts))?;
    writeln!(out)?;

    if result.is_clean() {
        writeln!(out, "No issues detected.")?;
        return Ok(out);
    }

    for finding in &result.findings {
        write_finding(&mut out, finding)?;
    }
    Ok(out)
}

fn write_finding(out: &mut String, finding: &Finding) -> std::fmt::Result {
    let badge = format!("[{}]", finding.severity.label()).color(finding.theme().color());
    writeln!(out, "{badge} {}", finding.kind.label())?;
    if let Some(excerpt) = &finding.excerpt {
        writeln!(out, "    \"{}\"", sanitize_excerpt(excerpt))?;
    }
    if let Some(recommendation) = &finding.recommendation {
        writeln!(out, "    -> {recommendation}")?;
    }
    Ok(())
}

fn pill_counts(counts: &SeverityCounts) -> String {
    let mut pills = format!(
        "HIGH {} • MEDIUM {} • LOW {}",
        counts.high, counts.medium, counts.low
    );
    if counts.unrecognized > 0 {
        let _ = write!(pills, " • OTHER {}", counts.unrecognized);
    }
    pills
}

fn mode_label(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::LegalRiskScoring => "legal risk scoring",
        AnalysisMode::VulnerabilityDetection => "vulnerability detection",
        AnalysisMode::PiiMasking => "pii masking",
    }
}

fn sanitize_excerpt(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    filename: &'a str,
    mode: AnalysisMode,
    score: i64,
    band: ScoreBand,
    summary: &'a SeverityCounts,
    no_issues: bool,
    findings: Vec<JsonFinding<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonFinding<'a> {
    severity: &'a str,
    rank: u8,
    theme: &'static str,
    category: &'static str,
    label: &'a str,
    excerpt: Option<&'a str>,
    recommendation: Option<&'a str>,
}

impl<'a> From<&'a AnalysisResult> for JsonReport<'a> {
    fn from(result: &'a AnalysisResult) -> Self {
        Self {
            filename: &result.filename,
            mode: result.mode,
            score: result.score,
            band: result.band,
            summary: &result.counts,
            no_issues: result.is_clean(),
            findings: result
                .findings
                .iter()
                .map(|finding| JsonFinding {
                    severity: finding.severity.label(),
                    rank: finding.severity.rank(),
                    theme: finding.theme().key(),
                    category: finding.kind.category(),
                    label: finding.kind.label(),
                    excerpt: finding.excerpt.as_deref(),
                    recommendation: finding.recommendation.as_deref(),
                })
                .collect(),
        }
    }
}
