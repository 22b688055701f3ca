use std::{fs, path::PathBuf};

use insta::assert_json_snapshot;
use sentinel_core::{AnalysisMode, AnalysisResult, RawReport};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(name: &str) -> RawReport {
    let path = fixture_dir().join(name);
    let raw = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {err}", path.display()));
    serde_json::from_str(&raw)
        .unwrap_or_else(|err| panic!("failed to parse fixture {}: {err}", path.display()))
}

#[test]
fn legal_report_snapshot() {
    let result = AnalysisResult::from_report(
        load_fixture("legal_report.json"),
        Some(AnalysisMode::LegalRiskScoring),
        None,
    );
    assert_json_snapshot!("legal_report", result);
}

#[test]
fn pii_report_snapshot() {
    let result = AnalysisResult::from_report(load_fixture("pii_report.json"), None, None);
    assert_json_snapshot!("pii_report", result);
}
