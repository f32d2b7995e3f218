use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use super::{StageAdapter, StageInputs, StageOutcome};
use crate::artifact::{html, markdown};
use crate::collaborators::{LlmCollaborator, PageFetcher};
use crate::domain::{SpecDocument, StageArtifact, StageKind, StagePayload};
use crate::error::Result;
use crate::integration::StageMode;

/// Fetches the target page and turns it into a specification document
pub struct ExtractStage {
    page: Arc<dyn PageFetcher>,
    llm: Arc<dyn LlmCollaborator>,
}

impl ExtractStage {
    pub fn new(page: Arc<dyn PageFetcher>, llm: Arc<dyn LlmCollaborator>) -> Self {
        Self { page, llm }
    }

    /// Structural spec built without a model. `page` is None when the fetch failed.
    fn heuristic_spec(url: &str, page: Option<&str>) -> SpecDocument {
        let body = page.unwrap_or("");
        let components = html::extract_components(body);
        let features = markdown::heuristic_features(&components);
        let scenarios = markdown::default_scenarios();
        let now = Local::now();
        let title = html::page_title(body);

        SpecDocument {
            target_url: url.to_string(),
            markdown: markdown::render_fallback_spec(url, title.as_deref(), &components, &features, &scenarios, &now),
            components,
            features,
            scenarios,
            content_digest: page.map(html::content_digest),
            extracted_at: now,
        }
    }
}

#[async_trait]
impl StageAdapter for ExtractStage {
    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    async fn run(&self, inputs: &StageInputs<'_>, mode: StageMode) -> Result<StageOutcome> {
        let url = inputs.target_url;
        let fetched = self.page.fetch(url).await;

        let page = match fetched {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Target page fetch failed");
                let spec = Self::heuristic_spec(url, None);
                return Ok(StageOutcome::Degraded(StageArtifact::fallback(
                    StagePayload::Spec(spec),
                    false,
                    format!("target page unavailable: {}", e),
                )));
            }
        };

        if mode == StageMode::Full {
            let components = html::extract_components(&page);
            match self.llm.generate_spec(url, &page, &components).await {
                Ok(spec) => return Ok(StageOutcome::Ok(StageArtifact::full(StagePayload::Spec(spec)))),
                Err(e) => {
                    tracing::warn!(stage = "extract", error = %e, "LLM spec synthesis failed, using heuristics");
                    let spec = Self::heuristic_spec(url, Some(&page));
                    return Ok(StageOutcome::Degraded(StageArtifact::fallback(
                        StagePayload::Spec(spec),
                        false,
                        e.to_string(),
                    )));
                }
            }
        }

        let spec = Self::heuristic_spec(url, Some(&page));
        Ok(StageOutcome::Degraded(StageArtifact::fallback(
            StagePayload::Spec(spec),
            true,
            "llm unreachable at probe time; heuristic extraction",
        )))
    }
}
