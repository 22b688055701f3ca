use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    AnalysisBackend, AnalysisRequest, ClientSettings, HealthStatus, JobId, JobSnapshot, RawReport,
    Submission,
};
use crate::error::ClientError;
use crate::history::HistoryEntry;

/// [`AnalysisBackend`] over the service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> anyhow::Result<Self> {
        use anyhow::Context;

        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!("analysis service base URL must not be empty");
        }
        let http = Client::builder()
            .user_agent(concat!("sentinel-edge/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build analysis service HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Direct link to the downloadable HTML report.
    pub fn report_html_url(&self, job_id: &JobId) -> String {
        self.url(&format!("/api/report/{job_id}/html"))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = check_status(response).await?;
        decode_json(response).await
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn submit(&self, request: &AnalysisRequest) -> Result<Submission, ClientError> {
        let part = Part::bytes(request.contents.clone())
            .file_name(request.filename.clone())
            .mime_str(mime_for(&request.filename))
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        let mut form = Form::new()
            .part("file", part)
            .text("selection", request.mode.as_str());
        if let Some(prompt) = &request.context_prompt {
            form = form.text("prompt", prompt.clone());
        }

        debug!(
            filename = %request.filename,
            mode = %request.mode,
            bytes = request.contents.len(),
            "submitting analysis request"
        );
        let response = self
            .http
            .post(self.url("/api/analyze"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: Value = decode_json(response).await?;
        parse_submission(body)
    }

    async fn status(&self, job_id: &JobId) -> Result<JobSnapshot, ClientError> {
        self.get_json(&format!("/api/status/{job_id}")).await
    }

    async fn report(&self, job_id: &JobId) -> Result<RawReport, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/report/{job_id}")))
            .send()
            .await?;
        let response = check_status(response).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Err(ClientError::ReportNotReady {
                job_id: job_id.to_string(),
            });
        }
        parse_report(decode_json(response).await?)
    }

    async fn report_html(&self, job_id: &JobId) -> Result<String, ClientError> {
        let response = self.http.get(self.report_html_url(job_id)).send().await?;
        let response = check_status(response).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Err(ClientError::ReportNotReady {
                job_id: job_id.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        self.get_json("/api/history").await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json("/").await
    }
}

/// Map a non-success response to [`ClientError`], preferring the backend's `detail`.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match error_detail(&body) {
        Some(detail) => Err(ClientError::Backend {
            status: status.as_u16(),
            detail,
        }),
        None => Err(ClientError::Transport(format!(
            "analysis service responded with {status}"
        ))),
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Extract the `detail` field of an error body. Validation errors arrive as a list.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A body carrying a string `job_id` is an accepted job; a body carrying a
/// findings collection is a finished report. Anything else is malformed.
fn parse_submission(body: Value) -> Result<Submission, ClientError> {
    match body.get("job_id") {
        Some(Value::String(job_id)) if !job_id.trim().is_empty() => {
            info!(job_id = %job_id, "analysis job accepted");
            Ok(Submission::Accepted(JobId::new(job_id.as_str())))
        }
        Some(other) => Err(ClientError::Decode(format!("invalid job_id `{other}`"))),
        None => parse_report(body).map(Submission::Completed),
    }
}

/// Decode a report body. `{}` or a status-only body must not pass as a clean report.
fn parse_report(body: Value) -> Result<RawReport, ClientError> {
    let report: RawReport =
        serde_json::from_value(body).map_err(|err| ClientError::Decode(err.to_string()))?;
    if !report.is_report_shaped() {
        return Err(ClientError::Decode(
            "response carries neither `findings` nor `pii_instances`".into(),
        ));
    }
    Ok(report)
}

fn mime_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "text/plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{AnalysisMode, JobStatus};
    use httpmock::prelude::*;
    use serde_json::json;

    fn backend(url: String) -> HttpBackend {
        HttpBackend::new(&ClientSettings {
            base_url: url,
            timeout_secs: Some(5),
            ..ClientSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn error_detail_prefers_backend_message() {
        assert_eq!(
            error_detail(r#"{"detail": "File type .exe not supported"}"#).as_deref(),
            Some("File type .exe not supported")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"msg": "field required"}, {"msg": "bad selection"}]}"#)
                .as_deref(),
            Some("field required; bad selection")
        );
        assert!(error_detail("<html>502 Bad Gateway</html>").is_none());
        assert!(error_detail(r#"{"detail": null}"#).is_none());
    }

    #[test]
    fn submission_distinguishes_job_from_report() {
        let accepted =
            parse_submission(json!({"job_id": "j-1", "filename": "a.pdf", "status": "processing"}))
                .unwrap();
        assert_eq!(accepted, Submission::Accepted(JobId::new("j-1")));

        let completed = parse_submission(json!({
            "filename": "a.pdf",
            "selection": "legal_risk_scoring",
            "score": 40,
            "findings": []
        }))
        .unwrap();
        assert!(matches!(completed, Submission::Completed(report) if report.score == Some(40.0)));

        let err = parse_submission(json!({"score": "high"})).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn bodies_without_findings_are_malformed() {
        for body in [
            json!({}),
            json!({"status": "processing"}),
            json!({"job_id": 42}),
            json!({"job_id": ""}),
            json!({"error": "boom"}),
            json!({"filename": "a.pdf", "score": 0}),
        ] {
            let err = parse_submission(body.clone()).unwrap_err();
            assert!(err.is_transport(), "{body} should be rejected, got {err:?}");
        }
    }

    #[test]
    fn pii_only_report_is_accepted() {
        let report = parse_report(json!({"filename": "id.pdf", "pii_instances": []})).unwrap();
        assert_eq!(report.pii_instances, Some(Vec::new()));
        assert!(parse_report(json!({"score": 12})).unwrap_err().is_transport());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = backend("http://localhost:8000/".into());
        assert_eq!(
            backend.report_html_url(&JobId::new("abc")),
            "http://localhost:8000/api/report/abc/html"
        );
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn submit_posts_multipart_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/analyze")
                    .body_contains("legal_risk_scoring")
                    .body_contains("contract.pdf");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"job_id": "job-42", "status": "processing"}));
            })
            .await;

        let request = AnalysisRequest::new(
            "contract.pdf",
            b"%PDF-1.7".to_vec(),
            AnalysisMode::LegalRiskScoring,
        )
        .unwrap();
        let submission = backend(server.base_url()).submit(&request).await.unwrap();
        assert_eq!(submission, Submission::Accepted(JobId::new("job-42")));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn submit_surfaces_backend_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/analyze");
                then.status(400)
                    .json_body(json!({"detail": "Only PDF files are supported"}));
            })
            .await;

        let request =
            AnalysisRequest::new("a.pdf", vec![], AnalysisMode::PiiMasking).unwrap();
        let err = backend(server.base_url()).submit(&request).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Backend {
                status: 400,
                detail: "Only PDF files are supported".into()
            }
        );
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn status_and_report_decode() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/status/job-7");
                then.status(200)
                    .json_body(json!({"job_id": "job-7", "status": "processing", "progress": 40}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/report/job-7");
                then.status(202)
                    .json_body(json!({"detail": "Analysis not complete yet"}));
            })
            .await;

        let backend = backend(server.base_url());
        let job = JobId::new("job-7");
        let snapshot = backend.status(&job).await.unwrap();
        assert_eq!(snapshot, JobSnapshot::new(JobStatus::Processing, 40));

        let err = backend.report(&job).await.unwrap_err();
        assert!(matches!(err, ClientError::ReportNotReady { .. }));
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn empty_report_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/report/job-8");
                then.status(200).json_body(json!({"status": "complete"}));
            })
            .await;

        let err = backend(server.base_url())
            .report(&JobId::new("job-8"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) is not expected to host an HTTP server.
        let backend = backend("http://127.0.0.1:9".into());
        let err = backend.health().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
    }
}
