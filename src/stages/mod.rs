//! Pipeline Stage Adapters
//!
//! Each of the four stages calls its collaborator when the strategy selected
//! the full path, and falls back to a collaborator-free behavior otherwise.
//! Collaborator failures never escape an adapter: they become a degraded
//! artifact. The only error an adapter returns is a contract violation, when a
//! prerequisite artifact is missing or of the wrong kind.

mod analyze;
mod design;
mod execute;
mod extract;

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    ExecutionResult, ImprovementAnalysis, SpecDocument, StageArtifact, StageKind, StagePayload, TestDesign,
};
use crate::error::{QaLoopError, Result};
use crate::integration::StageMode;

pub use analyze::AnalyzeStage;
pub use design::DesignStage;
pub use execute::ExecuteStage;
pub use extract::ExtractStage;

/// Everything produced so far in the current iteration, plus run context
#[derive(Debug, Clone, Copy, Default)]
pub struct StageInputs<'a> {
    pub target_url: &'a str,
    pub extract: Option<&'a StageArtifact>,
    pub design: Option<&'a StageArtifact>,
    pub execute: Option<&'a StageArtifact>,
    /// Analysis from the previous iteration, if there was one
    pub previous_analysis: Option<&'a ImprovementAnalysis>,
    pub evidence_dir: Option<&'a Path>,
}

impl<'a> StageInputs<'a> {
    pub fn new(target_url: &'a str) -> Self {
        Self {
            target_url,
            ..Default::default()
        }
    }

    pub fn spec(&self) -> Result<&'a SpecDocument> {
        require(self.extract, StageKind::Extract)?
            .as_spec()
            .ok_or_else(|| wrong_payload(StageKind::Extract))
    }

    pub fn test_design(&self) -> Result<&'a TestDesign> {
        require(self.design, StageKind::Design)?
            .as_design()
            .ok_or_else(|| wrong_payload(StageKind::Design))
    }

    pub fn execution(&self) -> Result<&'a ExecutionResult> {
        require(self.execute, StageKind::Execute)?
            .as_execution()
            .ok_or_else(|| wrong_payload(StageKind::Execute))
    }
}

fn require(artifact: Option<&StageArtifact>, kind: StageKind) -> Result<&StageArtifact> {
    artifact.ok_or_else(|| QaLoopError::contract(format!("{} artifact required but not produced", kind)))
}

fn wrong_payload(kind: StageKind) -> QaLoopError {
    QaLoopError::contract(format!("{} slot holds an artifact of another kind", kind))
}

/// What a stage adapter produced
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Full path succeeded
    Ok(StageArtifact),
    /// Fallback produced the artifact, either by selection or after a failure
    Degraded(StageArtifact),
    /// Neither path could produce anything
    Unavailable { reason: String },
}

impl StageOutcome {
    /// Resolve to an artifact, synthesizing an empty fallback when unavailable
    pub fn into_artifact(self, kind: StageKind) -> StageArtifact {
        match self {
            StageOutcome::Ok(a) | StageOutcome::Degraded(a) => a,
            StageOutcome::Unavailable { reason } => empty_artifact(kind, reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, StageOutcome::Ok(_))
    }
}

/// Empty payload of the given kind, recorded as an unsuccessful fallback
pub fn empty_artifact(kind: StageKind, note: impl Into<String>) -> StageArtifact {
    let payload = match kind {
        StageKind::Extract => StagePayload::Spec(SpecDocument {
            target_url: String::new(),
            markdown: String::new(),
            components: Vec::new(),
            features: Vec::new(),
            scenarios: Vec::new(),
            content_digest: None,
            extracted_at: chrono::Local::now(),
        }),
        StageKind::Design => StagePayload::Design(TestDesign::default()),
        StageKind::Execute => StagePayload::Execution(ExecutionResult::default()),
        StageKind::Analyze => StagePayload::Analysis(ImprovementAnalysis::new(Vec::new(), Vec::new(), Vec::new())),
    };
    StageArtifact::fallback(payload, false, note)
}

/// One pipeline stage
#[async_trait]
pub trait StageAdapter: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self, inputs: &StageInputs<'_>, mode: StageMode) -> Result<StageOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Provenance;

    #[test]
    fn test_empty_artifact_matches_kind() {
        for kind in StageKind::ALL {
            let artifact = empty_artifact(kind, "nothing produced");
            assert_eq!(artifact.kind(), kind);
            assert_eq!(artifact.provenance(), Provenance::Fallback);
            assert!(!artifact.success());
            assert_eq!(artifact.note(), Some("nothing produced"));
        }
    }

    #[test]
    fn test_unavailable_resolves_to_empty_artifact() {
        let outcome = StageOutcome::Unavailable {
            reason: "no cases".to_string(),
        };
        assert!(outcome.is_degraded());
        let artifact = outcome.into_artifact(StageKind::Execute);
        assert_eq!(artifact.as_execution().unwrap().tally.total, 0);
    }

    #[test]
    fn test_missing_prerequisite_is_contract_violation() {
        let inputs = StageInputs::new("http://app");
        assert!(inputs.spec().unwrap_err().is_contract_violation());
        assert!(inputs.test_design().unwrap_err().is_contract_violation());
        assert!(inputs.execution().unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_wrong_kind_in_slot_is_contract_violation() {
        let design = empty_artifact(StageKind::Design, "x");
        let inputs = StageInputs {
            extract: Some(&design),
            ..StageInputs::new("http://app")
        };
        let err = inputs.spec().unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("another kind"));
    }
}
