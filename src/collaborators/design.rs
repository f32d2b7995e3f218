//! Client for the test-design service.
//!
//! The service is a three-step exchange: upload the specification markdown,
//! start the design run, then download the resulting test case table.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use super::{CollabResult, DesignService};
use crate::artifact::table;
use crate::config::CollaboratorsConfig;
use crate::domain::{SpecDocument, TestDesign};
use crate::error::{CollaboratorError, QaLoopError, Result};

const SERVICE: &str = "design_service";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    filename: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DesignResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

pub struct HttpDesignService {
    client: Client,
    base_url: String,
}

impl HttpDesignService {
    pub fn new(config: &CollaboratorsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.call_timeout())
            .build()
            .map_err(|e| QaLoopError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.design_url.trim_end_matches('/').to_string(),
        })
    }

    async fn upload_spec(&self, markdown: &str) -> CollabResult<String> {
        let part = Part::bytes(markdown.as_bytes().to_vec())
            .file_name("requirements.md")
            .mime_str("text/markdown")
            .map_err(|e| CollaboratorError::malformed(SERVICE, e))?;
        let form = Form::new().part("spec_file", part);

        let resp: UploadResponse = self
            .client
            .post(format!("{}/upload_spec", self.base_url))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        match (resp.success, resp.filename) {
            (true, Some(filename)) => Ok(filename),
            _ => Err(CollaboratorError::malformed(
                SERVICE,
                format!("upload rejected: {}", resp.error.unwrap_or_else(|| "no filename".to_string())),
            )),
        }
    }

    async fn start_design(&self) -> CollabResult<Value> {
        let resp: DesignResponse = self
            .client
            .post(format!("{}/start_design", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        if !resp.success {
            return Err(CollaboratorError::malformed(
                SERVICE,
                format!("design failed: {}", resp.error.unwrap_or_default()),
            ));
        }
        Ok(resp.result)
    }

    async fn download_cases(&self, filename: &str) -> CollabResult<String> {
        self.client
            .get(format!("{}/download_test_cases/{}", self.base_url, filename))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?
            .text()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))
    }
}

/// Number of requirements the design document lists, if it lists any
fn requirements_count(result: &Value) -> usize {
    result
        .get("requirements")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

#[async_trait]
impl DesignService for HttpDesignService {
    async fn design(&self, spec: &SpecDocument) -> CollabResult<TestDesign> {
        let filename = self.upload_spec(&spec.markdown).await?;
        let result = self.start_design().await?;
        let csv = self.download_cases(&filename).await?;

        let cases = table::parse_cases(&csv).map_err(|e| CollaboratorError::malformed(SERVICE, e))?;
        if cases.is_empty() {
            return Err(CollaboratorError::malformed(SERVICE, "design produced no test cases"));
        }

        tracing::info!(filename = %filename, cases = cases.len(), "Test design received");
        Ok(TestDesign {
            requirements_count: requirements_count(&result),
            cases,
            raw: Some(result),
        })
    }
}
