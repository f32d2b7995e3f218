//! Degradation strategy selection.
//!
//! Each stage depends on exactly one collaborator; the stage runs its full
//! behavior when that collaborator answered the probe and falls back otherwise.
//! Stages are selected independently, so one dead service degrades only the
//! stage that needs it.

use serde::{Deserialize, Serialize};

use crate::domain::{Reachability, StageKind};

/// Behavior a stage adapter should use this iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    Full,
    Fallback,
}

impl StageMode {
    fn from_reachable(up: bool) -> Self {
        if up { StageMode::Full } else { StageMode::Fallback }
    }
}

/// Per-stage modes for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStrategy {
    pub extract: StageMode,
    pub design: StageMode,
    pub execute: StageMode,
    pub analyze: StageMode,
}

impl StageStrategy {
    pub fn select(reachability: &Reachability) -> Self {
        Self {
            extract: StageMode::from_reachable(reachability.llm),
            design: StageMode::from_reachable(reachability.design_service),
            execute: StageMode::from_reachable(reachability.execution_service),
            analyze: StageMode::from_reachable(reachability.llm),
        }
    }

    pub fn mode_for(&self, kind: StageKind) -> StageMode {
        match kind {
            StageKind::Extract => self.extract,
            StageKind::Design => self.design,
            StageKind::Execute => self.execute,
            StageKind::Analyze => self.analyze,
        }
    }

    /// Number of stages running their fallback behavior
    pub fn fallback_count(&self) -> usize {
        StageKind::ALL
            .iter()
            .filter(|k| self.mode_for(**k) == StageMode::Fallback)
            .count()
    }
}
