use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{StageAdapter, StageInputs, StageOutcome};
use crate::collaborators::DesignService;
use crate::domain::{SpecDocument, StageArtifact, StageKind, StagePayload, TestCase, TestDesign};
use crate::error::Result;
use crate::integration::StageMode;

/// Turns the extracted specification into test cases
pub struct DesignStage {
    service: Arc<dyn DesignService>,
}

impl DesignStage {
    pub fn new(service: Arc<dyn DesignService>) -> Self {
        Self { service }
    }

    /// One reachability case plus one presence case per component kind, in
    /// first-seen order
    pub fn template_design(spec: &SpecDocument) -> TestDesign {
        let mut cases = vec![TestCase {
            id: "TC-001".to_string(),
            name: "Page reachability".to_string(),
            objective: format!("{} responds successfully", spec.target_url),
            steps: vec![format!("Open {}", spec.target_url)],
            expected_results: vec!["The page loads".to_string()],
            expected_element: None,
        }];

        let mut seen = HashSet::new();
        for component in &spec.components {
            if !seen.insert(component.kind) {
                continue;
            }
            let key = component.kind.element_key();
            cases.push(TestCase {
                id: format!("TC-{:03}", cases.len() + 1),
                name: format!("{:?} present", component.kind),
                objective: format!("The page renders its {:?} ({})", component.kind, component.label),
                steps: vec![format!("Open {}", spec.target_url), format!("Locate the {} element", key)],
                expected_results: vec![format!("A {} element is displayed", key)],
                expected_element: Some(key.to_string()),
            });
        }

        TestDesign {
            requirements_count: seen.len() + 1,
            cases,
            raw: None,
        }
    }
}

#[async_trait]
impl StageAdapter for DesignStage {
    fn kind(&self) -> StageKind {
        StageKind::Design
    }

    async fn run(&self, inputs: &StageInputs<'_>, mode: StageMode) -> Result<StageOutcome> {
        let spec = inputs.spec()?;

        let note = match mode {
            StageMode::Full => match self.service.design(spec).await {
                Ok(design) => return Ok(StageOutcome::Ok(StageArtifact::full(StagePayload::Design(design)))),
                Err(e) => {
                    tracing::warn!(stage = "design", error = %e, "Design service failed, using templates");
                    Some(e.to_string())
                }
            },
            StageMode::Fallback => None,
        };

        let design = Self::template_design(spec);
        let artifact = match note {
            Some(reason) => StageArtifact::fallback(StagePayload::Design(design), false, reason),
            None => StageArtifact::fallback(
                StagePayload::Design(design),
                true,
                "design service unreachable at probe time; template cases",
            ),
        };
        Ok(StageOutcome::Degraded(artifact))
    }
}
