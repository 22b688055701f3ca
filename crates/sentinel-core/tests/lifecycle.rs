use std::{sync::Arc, time::Duration};

use httpmock::prelude::*;
use sentinel_core::{
    sort_newest_first, AnalysisBackend, AnalysisMode, AnalysisRequest, ClientSettings,
    HttpBackend, PollPolicy, SessionDriver, SessionState, Severity,
};
use serde_json::json;

fn settings(base_url: String) -> ClientSettings {
    ClientSettings {
        base_url,
        timeout_secs: Some(5),
        poll_interval: Duration::from_millis(10),
        ..ClientSettings::default()
    }
}

fn driver(server: &MockServer) -> SessionDriver<HttpBackend> {
    let settings = settings(server.base_url());
    let backend = HttpBackend::new(&settings).expect("backend should build");
    SessionDriver::new(Arc::new(backend), PollPolicy::from(&settings))
}

fn contract() -> AnalysisRequest {
    AnalysisRequest::new(
        "contract.pdf",
        b"%PDF-1.7 test".to_vec(),
        AnalysisMode::LegalRiskScoring,
    )
    .unwrap()
    .with_prompt(Some("Biggest risks for a contractor?".into()))
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn async_job_polls_until_report() {
    let server = MockServer::start_async().await;
    let analyze = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/analyze")
                .body_contains("Biggest risks");
            then.status(200)
                .json_body(json!({"job_id": "job-1", "filename": "contract.pdf", "status": "processing"}));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/status/job-1");
            then.status(200)
                .json_body(json!({"job_id": "job-1", "status": "complete", "progress": 100}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/report/job-1");
            then.status(200).json_body(json!({
                "filename": "contract.pdf",
                "score": 65,
                "summary": {"high": 1, "med": 0, "low": 1},
                "findings": [
                    {"risk_level": "LOW", "clause_type": "Governing Law"},
                    {"risk_level": "HIGH", "clause_type": "Non-Compete"}
                ]
            }));
        })
        .await;

    let driver = driver(&server);
    driver.select_file(contract());
    let state = driver.submit().await;

    let result = state.result().expect("job should complete");
    assert_eq!(result.findings[0].severity, Severity::High);
    assert_eq!(result.counts.total(), 2);
    analyze.assert_async().await;
    status.assert_async().await;
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn synchronous_contract_completes_in_one_call() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/analyze");
            then.status(200).json_body(json!({
                "filename": "contract.pdf",
                "selection": "legal_risk_scoring",
                "score": 0,
                "findings": [],
                "pii_instances": []
            }));
        })
        .await;

    let driver = driver(&server);
    driver.select_file(contract());
    let state = driver.submit().await;
    assert!(state.result().expect("complete").is_clean());
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn failed_job_surfaces_generic_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/analyze");
            then.status(200).json_body(json!({"job_id": "job-2"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/status/job-2");
            then.status(200).json_body(
                json!({"status": "error", "progress": 30, "error": "model not loaded"}),
            );
        })
        .await;

    let driver = driver(&server);
    driver.select_file(contract());
    let state = driver.submit().await;
    assert!(matches!(state, SessionState::Failed(_)));
    assert_eq!(state.error_message().as_deref(), Some("Analysis failed."));
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn history_is_resorted_client_side() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/history");
            then.status(200).json_body(json!([
                {"job_id": "a", "filename": "old.pdf", "score": 10, "created_at": "2026-01-01T08:00:00"},
                {"job_id": "b", "filename": "new.pdf", "score": 80, "created_at": "2026-02-01T08:00:00"}
            ]));
        })
        .await;

    let backend = HttpBackend::new(&settings(server.base_url())).unwrap();
    let mut entries = backend.history().await.unwrap();
    sort_newest_first(&mut entries);
    assert_eq!(entries[0].filename, "new.pdf");
}
