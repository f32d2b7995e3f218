//! Stage artifacts: the normalized, immutable output of one pipeline stage.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::payload::{ExecutionResult, ImprovementAnalysis, SpecDocument, TestDesign};

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Extract,
    Design,
    Execute,
    Analyze,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Extract,
        StageKind::Design,
        StageKind::Execute,
        StageKind::Analyze,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Extract => "extract",
            StageKind::Design => "design",
            StageKind::Execute => "execute",
            StageKind::Analyze => "analyze",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which behavior produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Full,
    Fallback,
}

/// Stage-specific payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StagePayload {
    Spec(SpecDocument),
    Design(TestDesign),
    Execution(ExecutionResult),
    Analysis(ImprovementAnalysis),
}

impl StagePayload {
    pub fn kind(&self) -> StageKind {
        match self {
            StagePayload::Spec(_) => StageKind::Extract,
            StagePayload::Design(_) => StageKind::Design,
            StagePayload::Execution(_) => StageKind::Execute,
            StagePayload::Analysis(_) => StageKind::Analyze,
        }
    }
}

/// Output of exactly one stage adapter call. Fields are private so an artifact
/// cannot change after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageArtifact {
    kind: StageKind,
    payload: StagePayload,
    provenance: Provenance,
    success: bool,
    note: Option<String>,
    produced_at: DateTime<Local>,
}

impl StageArtifact {
    /// Artifact produced by a collaborator on the full path
    pub fn full(payload: StagePayload) -> Self {
        Self::build(payload, Provenance::Full, true, None)
    }

    /// Artifact produced by the fallback behavior
    pub fn fallback(payload: StagePayload, success: bool, note: impl Into<String>) -> Self {
        Self::build(payload, Provenance::Fallback, success, Some(note.into()))
    }

    fn build(payload: StagePayload, provenance: Provenance, success: bool, note: Option<String>) -> Self {
        Self {
            kind: payload.kind(),
            payload,
            provenance,
            success,
            note,
            produced_at: Local::now(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn payload(&self) -> &StagePayload {
        &self.payload
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn produced_at(&self) -> DateTime<Local> {
        self.produced_at
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }

    pub fn as_spec(&self) -> Option<&SpecDocument> {
        match &self.payload {
            StagePayload::Spec(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn as_design(&self) -> Option<&TestDesign> {
        match &self.payload {
            StagePayload::Design(design) => Some(design),
            _ => None,
        }
    }

    pub fn as_execution(&self) -> Option<&ExecutionResult> {
        match &self.payload {
            StagePayload::Execution(execution) => Some(execution),
            _ => None,
        }
    }

    pub fn as_analysis(&self) -> Option<&ImprovementAnalysis> {
        match &self.payload {
            StagePayload::Analysis(analysis) => Some(analysis),
            _ => None,
        }
    }
}
