//! Domain types for qaloop
//!
//! This module contains all core domain types:
//! - Run / Iteration: the append-only record of one orchestrator invocation
//! - StageArtifact: normalized output of one pipeline stage
//! - Payloads: the typed data each stage produces
//! - IntegrationLevel / Reachability: collaborator availability
//! - ContinuationVerdict: the per-iteration stop/continue decision

pub mod artifact;
pub mod level;
pub mod payload;
pub mod run;
pub mod verdict;

pub use artifact::{Provenance, StageArtifact, StageKind, StagePayload};
pub use level::{IntegrationLevel, Reachability};
pub use payload::{
    CaseResult, CaseStatus, ComponentKind, Effort, ExecutionResult, Feature, Improvement, ImprovementAnalysis,
    NextIterationPlan, Priority, RootCause, SpecDocument, Tally, TestCase, TestDesign, UiComponent, UserScenario,
};
pub use run::{Iteration, Run, RunConfig, RunStatus};
pub use verdict::ContinuationVerdict;
