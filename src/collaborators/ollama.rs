//! Ollama client implementing spec synthesis and failure analysis
//!
//! Both operations send a single non-streaming `/api/generate` request and ask
//! the model for a JSON object, which is then normalized into domain types.

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CollabResult, LlmCollaborator, extract_json_object};
use crate::artifact::{html, markdown};
use crate::config::CollaboratorsConfig;
use crate::domain::{
    CaseResult, ExecutionResult, Feature, Improvement, ImprovementAnalysis, Priority, RootCause, SpecDocument,
    UiComponent, UserScenario,
};
use crate::error::{CollaboratorError, QaLoopError, Result};

const SERVICE: &str = "llm";

/// Page bytes sent to the model; long pages are truncated
const MAX_HTML_CHARS: usize = 6000;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    priority: String,
}

#[derive(Debug, Deserialize)]
struct SpecSynthesis {
    markdown: String,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default)]
    scenarios: Vec<UserScenario>,
}

#[derive(Debug, Deserialize)]
struct RawImprovement {
    #[serde(default)]
    category: String,
    #[serde(default)]
    priority: String,
    description: String,
    #[serde(default)]
    suggestion: String,
    #[serde(default)]
    test_strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisSynthesis {
    #[serde(default)]
    improvements: Vec<RawImprovement>,
    #[serde(default)]
    root_causes: Vec<RootCause>,
}

pub struct OllamaClient {
    client: Client,
    generate_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &CollaboratorsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.call_timeout())
            .build()
            .map_err(|e| QaLoopError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            generate_url: format!("{}/api/generate", config.llm_url.trim_end_matches('/')),
            model: config.llm_model.clone(),
        })
    }

    /// One completion; returns the model's raw text
    async fn generate(&self, prompt: &str) -> CollabResult<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(&self.generate_url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let parsed: GenerateResponse = resp.json().await.map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;
        tracing::debug!(model = %self.model, chars = parsed.response.len(), "LLM generation complete");
        Ok(parsed.response)
    }

    /// Generate and decode the JSON object embedded in the reply
    async fn generate_json<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> CollabResult<T> {
        let text = self.generate(prompt).await?;
        let object = extract_json_object(&text)
            .ok_or_else(|| CollaboratorError::malformed(SERVICE, "no JSON object in response"))?;
        serde_json::from_str(object).map_err(|e| CollaboratorError::malformed(SERVICE, e))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn spec_prompt(url: &str, html: &str, components: &[UiComponent]) -> String {
    let components = serde_json::to_string_pretty(components).unwrap_or_default();
    format!(
        r##"You are analyzing a web application to write its functional specification.

Target URL: {url}

UI components found on the page:
{components}

Page HTML (possibly truncated):
{html}

Reply with a single JSON object and nothing else:
{{
  "markdown": "# Functional Specification\n\n## {s0}\n...\n## {s1}\n...\n## {s2}\n...\n## {s3}\n...\n## {s4}\n...\n## {s5}\n...",
  "features": [{{"name": "", "description": "", "category": "auth|data|ui|other", "priority": "high|medium|low"}}],
  "scenarios": [{{"scenario": "", "steps": [""], "expected_outcome": ""}}]
}}"##,
        url = url,
        components = components,
        html = truncate(html, MAX_HTML_CHARS),
        s0 = markdown::SPEC_SECTIONS[0],
        s1 = markdown::SPEC_SECTIONS[1],
        s2 = markdown::SPEC_SECTIONS[2],
        s3 = markdown::SPEC_SECTIONS[3],
        s4 = markdown::SPEC_SECTIONS[4],
        s5 = markdown::SPEC_SECTIONS[5],
    )
}

fn analysis_prompt(failures: &[CaseResult], previous: Option<&ImprovementAnalysis>) -> String {
    let failures = serde_json::to_string_pretty(failures).unwrap_or_default();
    let previous = previous
        .map(|p| {
            let summary: Vec<String> = p
                .improvements
                .iter()
                .map(|i| format!("- [{:?}] {}: {}", i.priority, i.category, i.description))
                .collect();
            format!(
                "Improvements proposed last iteration ({} failed cases then):\n{}",
                p.failed_cases.len(),
                summary.join("\n")
            )
        })
        .unwrap_or_else(|| "This is the first iteration.".to_string());

    format!(
        r#"You are a QA engineer reviewing failed test cases.

Failed cases:
{failures}

{previous}

Identify root causes and propose concrete improvements. Reply with a single JSON object and nothing else:
{{
  "improvements": [{{"category": "functional|ui|performance|test", "priority": "high|medium|low", "description": "", "suggestion": "", "test_strategy": ""}}],
  "root_causes": [{{"issue": "", "cause": "", "impact": ""}}]
}}"#
    )
}

#[async_trait]
impl LlmCollaborator for OllamaClient {
    async fn generate_spec(&self, url: &str, page: &str, components: &[UiComponent]) -> CollabResult<SpecDocument> {
        let synthesis: SpecSynthesis = self.generate_json(&spec_prompt(url, page, components)).await?;

        if !markdown::looks_like_spec(&synthesis.markdown) {
            return Err(CollaboratorError::malformed(SERVICE, "specification markdown has no sections"));
        }

        Ok(SpecDocument {
            target_url: url.to_string(),
            markdown: synthesis.markdown,
            components: components.to_vec(),
            features: synthesis
                .features
                .into_iter()
                .map(|f| Feature {
                    name: f.name,
                    description: f.description,
                    category: f.category,
                    priority: Priority::parse(&f.priority),
                })
                .collect(),
            scenarios: synthesis.scenarios,
            content_digest: Some(html::content_digest(page)),
            extracted_at: Local::now(),
        })
    }

    async fn analyze(
        &self,
        execution: &ExecutionResult,
        previous: Option<&ImprovementAnalysis>,
    ) -> CollabResult<ImprovementAnalysis> {
        let failures: Vec<CaseResult> = execution.failures().cloned().collect();
        if failures.is_empty() {
            return Ok(ImprovementAnalysis::new(Vec::new(), Vec::new(), Vec::new()));
        }

        let synthesis: AnalysisSynthesis = self.generate_json(&analysis_prompt(&failures, previous)).await?;
        let improvements = synthesis
            .improvements
            .into_iter()
            .map(|i| Improvement {
                category: i.category,
                priority: Priority::parse(&i.priority),
                description: i.description,
                suggestion: i.suggestion,
                test_strategy: i.test_strategy.filter(|s| !s.is_empty()),
            })
            .collect();

        Ok(ImprovementAnalysis::new(failures, improvements, synthesis.root_causes))
    }
}
