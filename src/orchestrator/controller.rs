//! Loop controller - drives a Run through probe, four stages and a decision per
//! iteration until a stop verdict, a cancel or a contract violation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use super::cancel::CancelToken;
use super::decision::DecisionRules;
use super::pipeline::Pipeline;
use super::state::{LoopState, StateMachine};
use crate::collaborators::Collaborators;
use crate::config::LoopConfig;
use crate::domain::{Iteration, Run, RunConfig, RunStatus, StageArtifact, StageKind};
use crate::error::{QaLoopError, Result};
use crate::health::HealthProbe;
use crate::id::iteration_dir_name;
use crate::integration::{StageStrategy, resolve};
use crate::report::RunReport;
use crate::stages::{StageAdapter, StageInputs};
use crate::storage::ArtifactStore;

/// Tunables for the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub low_improvement_threshold: usize,
    pub fallback_proposal_count: usize,
    /// Pause between iterations
    pub iteration_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&LoopConfig::default())
    }
}

impl From<&LoopConfig> for ControllerConfig {
    fn from(config: &LoopConfig) -> Self {
        Self {
            low_improvement_threshold: config.low_improvement_threshold,
            fallback_proposal_count: config.fallback_proposal_count,
            iteration_delay: Duration::from_millis(config.iteration_delay_ms),
        }
    }
}

/// Everything a finished Run leaves behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: Run,
    pub report: RunReport,
    /// Where the report was written, None without a store or when the write failed
    pub report_path: Option<PathBuf>,
    pub final_state: LoopState,
}

pub struct LoopController {
    probe: Arc<dyn HealthProbe>,
    pipeline: Pipeline,
    store: Option<Arc<dyn ArtifactStore>>,
    cancel: CancelToken,
    config: ControllerConfig,
}

impl LoopController {
    pub fn new(collaborators: &Collaborators, probe: Arc<dyn HealthProbe>, config: ControllerConfig) -> Self {
        Self {
            probe,
            pipeline: Pipeline::from_collaborators(collaborators, config.fallback_proposal_count),
            store: None,
            cancel: CancelToken::new(),
            config,
        }
    }

    /// Persist artifacts and the final report through `store`
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Observe `cancel` at every iteration boundary
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the standard stage adapters
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute a Run to a terminal status. Never fails: a contract violation
    /// ends the Run as `failed` with the diagnostic attached.
    pub async fn run(&self, run_config: RunConfig) -> RunOutcome {
        let mut run = Run::new(run_config);
        let mut machine = StateMachine::new();

        tracing::info!(
            run_id = %run.id,
            target = %run.config.target_url,
            max_loops = run.config.max_loops,
            "Run started"
        );

        match self.drive(&mut run, &mut machine).await {
            Ok(status) => run.finish(status, None),
            Err(e) => {
                tracing::error!(run_id = %run.id, error = %e, "Run failed");
                machine.fail();
                run.finish(RunStatus::Failed, Some(e.to_string()));
            }
        }

        let report = RunReport::from_run(&run);
        let report_path = self.store.as_ref().and_then(|store| match store.save_report(&report) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save final report");
                None
            }
        });

        tracing::info!(
            run_id = %run.id,
            status = ?run.status(),
            iterations = run.iterations().len(),
            "Run finished"
        );

        RunOutcome {
            run,
            report,
            report_path,
            final_state: machine.state(),
        }
    }

    async fn drive(&self, run: &mut Run, machine: &mut StateMachine) -> Result<RunStatus> {
        self.pipeline.validate()?;
        let rules = DecisionRules::new(run.config.max_loops, self.config.low_improvement_threshold);

        machine.advance(LoopState::Probing)?;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(run_id = %run.id, completed = run.iterations().len(), "Cancel observed");
                machine.advance(LoopState::RunComplete)?;
                return Ok(RunStatus::Cancelled);
            }

            let iteration = self.run_iteration(run, machine, &rules).await?;
            let verdict = iteration.verdict;
            run.record(iteration)?;

            if let Some(status) = RunStatus::from_verdict(verdict) {
                machine.advance(LoopState::RunComplete)?;
                return Ok(status);
            }
            if !run.budget_remaining() {
                return Err(QaLoopError::contract(format!(
                    "continue verdict after {} of {} iterations",
                    run.iterations().len(),
                    run.config.max_loops
                )));
            }

            if !self.config.iteration_delay.is_zero() {
                tokio::time::sleep(self.config.iteration_delay).await;
            }
            machine.advance(LoopState::Probing)?;
        }
    }

    async fn run_iteration(&self, run: &Run, machine: &mut StateMachine, rules: &DecisionRules) -> Result<Iteration> {
        let sequence = run.next_sequence();
        let started_at = Local::now();
        let dir_name = iteration_dir_name(sequence, &started_at);

        let reachability = self.probe.probe().await;
        let level = resolve(&reachability);
        let strategy = StageStrategy::select(&reachability);
        tracing::info!(
            sequence,
            reachability = %reachability,
            level = %level,
            fallback_stages = strategy.fallback_count(),
            "Iteration started"
        );

        let evidence_dir = self.prepare(&dir_name);
        let target_url = run.config.target_url.as_str();
        let previous_analysis = run.last_iteration().and_then(|it| it.analyze.as_analysis());
        let base = StageInputs {
            previous_analysis,
            evidence_dir: evidence_dir.as_deref(),
            ..StageInputs::new(target_url)
        };

        machine.advance(LoopState::Extracting)?;
        let extract = self.run_stage(&self.pipeline.extract, StageKind::Extract, &base, &strategy).await?;
        self.persist(&dir_name, &extract);

        machine.advance(LoopState::Designing)?;
        let inputs = StageInputs {
            extract: Some(&extract),
            ..base
        };
        let design = self.run_stage(&self.pipeline.design, StageKind::Design, &inputs, &strategy).await?;
        self.persist(&dir_name, &design);

        machine.advance(LoopState::Executing)?;
        let inputs = StageInputs {
            design: Some(&design),
            ..inputs
        };
        let execute = self.run_stage(&self.pipeline.execute, StageKind::Execute, &inputs, &strategy).await?;
        self.persist(&dir_name, &execute);

        machine.advance(LoopState::Analyzing)?;
        let inputs = StageInputs {
            execute: Some(&execute),
            ..inputs
        };
        let analyze = self.run_stage(&self.pipeline.analyze, StageKind::Analyze, &inputs, &strategy).await?;
        self.persist(&dir_name, &analyze);

        machine.advance(LoopState::Deciding)?;
        let verdict = rules.decide(sequence, Some(&execute), Some(&analyze))?;
        machine.advance(LoopState::IterationDone)?;

        Ok(Iteration {
            sequence,
            started_at,
            dir_name,
            reachability,
            level,
            extract,
            design,
            execute,
            analyze,
            verdict,
        })
    }

    async fn run_stage(
        &self,
        adapter: &Arc<dyn StageAdapter>,
        kind: StageKind,
        inputs: &StageInputs<'_>,
        strategy: &StageStrategy,
    ) -> Result<StageArtifact> {
        let mode = strategy.mode_for(kind);
        let outcome = adapter.run(inputs, mode).await?;
        if outcome.is_degraded() {
            tracing::warn!(stage = %kind, mode = ?mode, "Stage degraded");
        }

        let artifact = outcome.into_artifact(kind);
        if artifact.kind() != kind {
            return Err(QaLoopError::contract(format!(
                "{} stage produced a {} artifact",
                kind,
                artifact.kind()
            )));
        }
        tracing::debug!(
            stage = %kind,
            provenance = ?artifact.provenance(),
            success = artifact.success(),
            "Stage finished"
        );
        Ok(artifact)
    }

    /// Create the iteration directory; None when there is no store or it failed
    fn prepare(&self, dir_name: &str) -> Option<PathBuf> {
        let store = self.store.as_ref()?;
        match store.prepare_iteration(dir_name) {
            Ok(evidence) => Some(evidence),
            Err(e) => {
                tracing::warn!(dir = dir_name, error = %e, "Failed to prepare iteration directory");
                None
            }
        }
    }

    fn persist(&self, dir_name: &str, artifact: &StageArtifact) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_artifact(dir_name, artifact) {
            tracing::warn!(dir = dir_name, stage = %artifact.kind(), error = %e, "Failed to persist artifact");
        }
    }
}
