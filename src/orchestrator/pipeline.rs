use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::domain::StageKind;
use crate::error::{QaLoopError, Result};
use crate::stages::{AnalyzeStage, DesignStage, ExecuteStage, ExtractStage, StageAdapter};

/// The four stage adapters, one per slot, run in slot order
#[derive(Clone)]
pub struct Pipeline {
    pub extract: Arc<dyn StageAdapter>,
    pub design: Arc<dyn StageAdapter>,
    pub execute: Arc<dyn StageAdapter>,
    pub analyze: Arc<dyn StageAdapter>,
}

impl Pipeline {
    /// Standard adapters wired to the given collaborators
    pub fn from_collaborators(collaborators: &Collaborators, fallback_proposals: usize) -> Self {
        Self {
            extract: Arc::new(ExtractStage::new(collaborators.page.clone(), collaborators.llm.clone())),
            design: Arc::new(DesignStage::new(collaborators.design.clone())),
            execute: Arc::new(ExecuteStage::new(
                collaborators.page.clone(),
                collaborators.execution.clone(),
            )),
            analyze: Arc::new(AnalyzeStage::new(collaborators.llm.clone(), fallback_proposals)),
        }
    }

    pub fn slots(&self) -> [(StageKind, &Arc<dyn StageAdapter>); 4] {
        [
            (StageKind::Extract, &self.extract),
            (StageKind::Design, &self.design),
            (StageKind::Execute, &self.execute),
            (StageKind::Analyze, &self.analyze),
        ]
    }

    /// Every adapter must sit in the slot for its own kind
    pub fn validate(&self) -> Result<()> {
        for (slot, adapter) in self.slots() {
            if adapter.kind() != slot {
                return Err(QaLoopError::contract(format!(
                    "{} adapter installed in the {} slot",
                    adapter.kind(),
                    slot
                )));
            }
        }
        Ok(())
    }
}
