//! Client for the human-in-the-loop test-execution service.
//!
//! Cases are uploaded as a CSV table, then one execution is created and
//! started per case. The service only reports a case as completed once a
//! person has walked through every step, so a case still running when we read
//! it back is recorded as skipped rather than failed.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{CollabResult, ExecutionService};
use crate::artifact::table;
use crate::config::CollaboratorsConfig;
use crate::domain::{CaseResult, CaseStatus, ExecutionResult, TestCase};
use crate::error::{CollaboratorError, QaLoopError, Result};

const SERVICE: &str = "execution_service";
const EXECUTION_STYLE: &str = "Semi-Automated BDD";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    execution_id: Option<String>,
    error: Option<String>,
}

pub struct HttpExecutionService {
    client: Client,
    base_url: String,
}

impl HttpExecutionService {
    pub fn new(config: &CollaboratorsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.call_timeout())
            .build()
            .map_err(|e| QaLoopError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.execution_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn upload_cases(&self, cases: &[TestCase]) -> CollabResult<()> {
        let part = Part::bytes(table::format_cases(cases).into_bytes())
            .file_name("test_cases.csv")
            .mime_str("text/csv")
            .map_err(|e| CollaboratorError::malformed(SERVICE, e))?;
        let form = Form::new().part("test_cases_file", part);

        let resp: UploadResponse = self
            .client
            .post(self.url("upload_test_cases"))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        if resp.success {
            Ok(())
        } else {
            Err(CollaboratorError::malformed(
                SERVICE,
                format!("upload rejected: {}", resp.error.unwrap_or_default()),
            ))
        }
    }

    /// Create, start and read back one execution; returns the final execution document
    async fn run_case(&self, case: &TestCase) -> CollabResult<Value> {
        let created: CreateResponse = self
            .client
            .post(self.url("create_execution"))
            .json(&json!({ "test_case_id": case.id, "execution_style": EXECUTION_STYLE }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let execution_id = match (created.success, created.execution_id) {
            (true, Some(id)) => id,
            _ => {
                return Err(CollaboratorError::malformed(
                    SERVICE,
                    format!("execution not created: {}", created.error.unwrap_or_default()),
                ));
            }
        };

        self.client
            .post(self.url(&format!("start_execution/{}", execution_id)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        self.client
            .get(self.url(&format!("get_execution/{}", execution_id)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))
    }
}

/// Interpret an execution document returned by `get_execution`
fn case_result(case: &TestCase, execution: &Value) -> CaseResult {
    let failed_step = execution
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|step| step.get("status").and_then(Value::as_str))
        .any(|s| matches!(CaseStatus::parse(s), CaseStatus::Failed | CaseStatus::Error));

    let status = execution.get("status").and_then(Value::as_str).unwrap_or("unknown");
    let mut result = CaseResult::passed(case);
    if failed_step {
        result.status = CaseStatus::Failed;
        result.failure_reason = Some("a step was recorded as failed".to_string());
    } else if status != "completed" {
        result.status = CaseStatus::Skipped;
        result.failure_reason = Some(format!("awaiting human execution (status: {})", status));
    }
    result
}

fn save_evidence(dir: &Path, case: &TestCase, execution: &Value) {
    let path = dir.join(format!("{}.json", case.id));
    let written = serde_json::to_string_pretty(execution)
        .map_err(std::io::Error::other)
        .and_then(|body| std::fs::write(&path, body));
    if let Err(e) = written {
        tracing::warn!(path = %path.display(), error = %e, "Failed to save execution evidence");
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    async fn execute(&self, cases: &[TestCase], evidence_dir: Option<&Path>) -> CollabResult<ExecutionResult> {
        self.upload_cases(cases).await?;

        let mut results = Vec::with_capacity(cases.len());
        let mut last_error = None;
        for case in cases {
            match self.run_case(case).await {
                Ok(execution) => {
                    if let Some(dir) = evidence_dir {
                        save_evidence(dir, case, &execution);
                    }
                    results.push(case_result(case, &execution));
                }
                Err(e) => {
                    tracing::warn!(case = %case.id, error = %e, "Execution of case failed");
                    let mut result = CaseResult::failed(case, e.to_string());
                    result.status = CaseStatus::Error;
                    results.push(result);
                    last_error = Some(e);
                }
            }
        }

        // No case reached the service: that is a service outage, not a set of
        // application failures
        if results.iter().all(|r| r.status == CaseStatus::Error) {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(ExecutionResult::new(results, evidence_dir.map(Path::to_path_buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    fn case(id: &str) -> TestCase {
        TestCase {
            id: id.to_string(),
            name: format!("case {}", id),
            objective: String::new(),
            steps: vec!["open".to_string()],
            expected_results: vec![],
            expected_element: None,
        }
    }

    fn service_for(url: &str) -> HttpExecutionService {
        let config = CollaboratorsConfig {
            execution_url: url.to_string(),
            call_timeout_ms: 2000,
            ..Default::default()
        };
        HttpExecutionService::new(&config).unwrap()
    }

    #[test]
    fn test_case_result_mapping() {
        let c = case("TC-001");
        assert_eq!(
            case_result(&c, &json!({"status": "completed", "results": [{"status": "passed"}]})).status,
            CaseStatus::Passed
        );
        assert_eq!(
            case_result(&c, &json!({"status": "completed", "results": [{"status": "failed"}]})).status,
            CaseStatus::Failed
        );
        let running = case_result(&c, &json!({"status": "running", "results": []}));
        assert_eq!(running.status, CaseStatus::Skipped);
        assert!(running.failure_reason.unwrap().contains("running"));
    }

    #[tokio::test]
    async fn test_execute_full_exchange() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/upload_test_cases")
            .match_body(Matcher::Regex("name=\"test_cases_file\"".to_string()))
            .with_status(200)
            .with_body(json!({"success": true, "test_cases": []}).to_string())
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/create_execution")
            .match_body(Matcher::PartialJson(json!({"execution_style": "Semi-Automated BDD"})))
            .with_status(200)
            .with_body(json!({"success": true, "execution_id": "exec_1"}).to_string())
            .expect(2)
            .create_async()
            .await;
        let _start = server
            .mock("POST", "/start_execution/exec_1")
            .with_status(200)
            .with_body(json!({"success": true}).to_string())
            .expect(2)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/get_execution/exec_1")
            .with_status(200)
            .with_body(json!({"status": "completed", "results": [{"status": "passed"}]}).to_string())
            .expect(2)
            .create_async()
            .await;

        let evidence = TempDir::new().unwrap();
        let result = service_for(&server.url())
            .execute(&[case("TC-001"), case("TC-002")], Some(evidence.path()))
            .await
            .unwrap();

        upload.assert_async().await;
        assert_eq!(result.tally.total, 2);
        assert_eq!(result.tally.passed, 2);
        assert!(evidence.path().join("TC-001.json").exists());
        assert_eq!(result.evidence_dir.as_deref(), Some(evidence.path()));
    }

    #[tokio::test]
    async fn test_rejected_creation_errors_only_that_case() {
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/upload_test_cases")
            .with_status(200)
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;
        let _create_ok = server
            .mock("POST", "/create_execution")
            .match_body(Matcher::PartialJson(json!({"test_case_id": "TC-001"})))
            .with_status(200)
            .with_body(json!({"success": true, "execution_id": "exec_1"}).to_string())
            .create_async()
            .await;
        let _create_rejected = server
            .mock("POST", "/create_execution")
            .match_body(Matcher::PartialJson(json!({"test_case_id": "TC-002"})))
            .with_status(404)
            .create_async()
            .await;
        let _start = server
            .mock("POST", "/start_execution/exec_1")
            .with_status(200)
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/get_execution/exec_1")
            .with_status(200)
            .with_body(json!({"status": "completed", "results": [{"status": "passed"}]}).to_string())
            .create_async()
            .await;

        let result = service_for(&server.url())
            .execute(&[case("TC-001"), case("TC-002")], None)
            .await
            .unwrap();
        assert_eq!(result.tally.passed, 1);
        assert_eq!(result.tally.failed, 1);
        assert_eq!(result.results[1].status, CaseStatus::Error);
        assert!(result.results[1].failure_reason.is_some());
    }

    #[tokio::test]
    async fn test_service_down_after_upload_is_an_error() {
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/upload_test_cases")
            .with_status(200)
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/create_execution")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let err = service_for(&server.url())
            .execute(&[case("TC-001"), case("TC-002")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_service_down_after_upload_degrades_execute_stage() {
        use crate::collaborators::StaticPage;
        use crate::domain::{Provenance, SpecDocument, StageArtifact, StageKind, StagePayload, TestDesign};
        use crate::integration::StageMode;
        use crate::stages::{ExecuteStage, StageAdapter, StageInputs};
        use std::sync::Arc;

        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/upload_test_cases")
            .with_status(200)
            .with_body(json!({"success": true}).to_string())
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/create_execution")
            .with_status(503)
            .create_async()
            .await;

        let extract = StageArtifact::full(StagePayload::Spec(SpecDocument {
            target_url: "http://app".to_string(),
            markdown: String::new(),
            components: vec![],
            features: vec![],
            scenarios: vec![],
            content_digest: None,
            extracted_at: chrono::Local::now(),
        }));
        let design = StageArtifact::full(StagePayload::Design(TestDesign {
            cases: vec![case("TC-001"), case("TC-002")],
            requirements_count: 2,
            raw: None,
        }));
        let inputs = StageInputs {
            extract: Some(&extract),
            design: Some(&design),
            ..StageInputs::new("http://app")
        };

        let stage = ExecuteStage::new(
            Arc::new(StaticPage::new("<html><body>ok</body></html>")),
            Arc::new(service_for(&server.url())),
        );
        let outcome = stage.run(&inputs, StageMode::Full).await.unwrap();
        assert!(outcome.is_degraded());

        let artifact = outcome.into_artifact(StageKind::Execute);
        assert_eq!(artifact.provenance(), Provenance::Fallback);
        assert!(!artifact.success());
        // Shallow checks ran against the page instead
        assert_eq!(artifact.as_execution().unwrap().tally.passed, 2);
    }

    #[tokio::test]
    async fn test_upload_failure_is_an_error() {
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/upload_test_cases")
            .with_status(500)
            .create_async()
            .await;

        let err = service_for(&server.url()).execute(&[case("TC-001")], None).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unreachable { .. }));
    }
}
