use std::sync::Arc;

use async_trait::async_trait;

use super::{StageAdapter, StageInputs, StageOutcome};
use crate::collaborators::LlmCollaborator;
use crate::domain::{
    CaseResult, ExecutionResult, Improvement, ImprovementAnalysis, Priority, RootCause, StageArtifact, StageKind,
    StagePayload,
};
use crate::error::Result;
use crate::integration::StageMode;

/// Explains failures and proposes what the next iteration should focus on
pub struct AnalyzeStage {
    llm: Arc<dyn LlmCollaborator>,
    fallback_proposals: usize,
}

impl AnalyzeStage {
    pub fn new(llm: Arc<dyn LlmCollaborator>, fallback_proposals: usize) -> Self {
        Self {
            llm,
            fallback_proposals,
        }
    }

    /// Rule-based analysis: a fixed number of proposals when anything failed,
    /// none otherwise
    pub fn rule_based(execution: &ExecutionResult, proposals: usize) -> ImprovementAnalysis {
        let failed: Vec<CaseResult> = execution.failures().cloned().collect();
        if failed.is_empty() {
            return ImprovementAnalysis::new(Vec::new(), Vec::new(), Vec::new());
        }

        let mut improvements = Vec::with_capacity(proposals);
        if proposals > 0 {
            improvements.push(Improvement {
                category: "functional".to_string(),
                priority: Priority::High,
                description: format!("{} of {} test cases failed", failed.len(), execution.tally.total),
                suggestion: "Investigate the failing cases and fix the underlying behavior".to_string(),
                test_strategy: Some("Re-run the failed cases first".to_string()),
            });
        }
        for case in failed.iter().take(proposals.saturating_sub(1)) {
            improvements.push(Improvement {
                category: "test".to_string(),
                priority: Priority::Medium,
                description: format!("{} failed", case.case_id),
                suggestion: case
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "review the case definition".to_string()),
                test_strategy: None,
            });
        }
        // Proposals beyond the number of failed cases repeat the summary
        while improvements.len() < proposals {
            improvements.push(improvements[0].clone());
        }

        let root_causes = failed
            .iter()
            .map(|c| RootCause {
                issue: c.name.clone(),
                cause: c.failure_reason.clone().unwrap_or_else(|| format!("{:?}", c.status)),
                impact: "test case did not pass".to_string(),
            })
            .collect();

        ImprovementAnalysis::new(failed, improvements, root_causes)
    }
}

#[async_trait]
impl StageAdapter for AnalyzeStage {
    fn kind(&self) -> StageKind {
        StageKind::Analyze
    }

    async fn run(&self, inputs: &StageInputs<'_>, mode: StageMode) -> Result<StageOutcome> {
        let execution = inputs.execution()?;

        let failure = match mode {
            StageMode::Full => match self.llm.analyze(execution, inputs.previous_analysis).await {
                Ok(analysis) => return Ok(StageOutcome::Ok(StageArtifact::full(StagePayload::Analysis(analysis)))),
                Err(e) => {
                    tracing::warn!(stage = "analyze", error = %e, "LLM analysis failed, using rule-based analysis");
                    Some(e.to_string())
                }
            },
            StageMode::Fallback => None,
        };

        let analysis = Self::rule_based(execution, self.fallback_proposals);
        let artifact = match failure {
            Some(reason) => StageArtifact::fallback(StagePayload::Analysis(analysis), false, reason),
            None => StageArtifact::fallback(
                StagePayload::Analysis(analysis),
                true,
                "llm unreachable at probe time; rule-based analysis",
            ),
        };
        Ok(StageOutcome::Degraded(artifact))
    }
}
