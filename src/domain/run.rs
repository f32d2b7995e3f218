//! Run and Iteration records
//!
//! A Run is one end-to-end invocation against a target URL. It owns an
//! append-only sequence of Iterations; each Iteration is complete (four
//! artifacts plus a verdict) before it is appended.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::artifact::StageArtifact;
use super::level::{IntegrationLevel, Reachability};
use super::verdict::ContinuationVerdict;
use crate::error::{QaLoopError, Result};
use crate::id::generate_run_id;

/// Immutable per-run settings handed over by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub target_url: String,
    pub max_loops: u32,
    /// Whether the auxiliary services should be started; only the launcher reads this
    pub auto_start: bool,
    pub verbose: bool,
}

impl RunConfig {
    pub fn new(target_url: impl Into<String>, max_loops: u32) -> Result<Self> {
        let target_url = target_url.into();
        if target_url.trim().is_empty() {
            return Err(QaLoopError::Config("target url must not be empty".to_string()));
        }
        if max_loops < 1 {
            return Err(QaLoopError::Config("max_loops must be at least 1".to_string()));
        }
        Ok(Self {
            target_url,
            max_loops,
            auto_start: true,
            verbose: false,
        })
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One pass through the four-stage pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based sequence number
    pub sequence: u32,
    pub started_at: DateTime<Local>,
    /// `loop-NNN_<timestamp>` directory name for persisted artifacts
    pub dir_name: String,
    pub reachability: Reachability,
    pub level: IntegrationLevel,
    pub extract: StageArtifact,
    pub design: StageArtifact,
    pub execute: StageArtifact,
    pub analyze: StageArtifact,
    pub verdict: ContinuationVerdict,
}

impl Iteration {
    pub fn artifacts(&self) -> [&StageArtifact; 4] {
        [&self.extract, &self.design, &self.execute, &self.analyze]
    }
}

/// Terminal (or in-progress) status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Iterations still executing
    Running,
    /// Stopped on a zero-failure iteration
    Completed,
    /// Stopped because improvement proposals dried up
    StoppedEarly,
    /// Iteration budget exhausted
    MaxReached,
    /// Contract violation
    Failed,
    /// External cancel observed at an iteration boundary
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Terminal status implied by a stop verdict
    pub fn from_verdict(verdict: ContinuationVerdict) -> Option<Self> {
        match verdict {
            ContinuationVerdict::Continue => None,
            ContinuationVerdict::StopSuccess => Some(RunStatus::Completed),
            ContinuationVerdict::StopLowImprovement => Some(RunStatus::StoppedEarly),
            ContinuationVerdict::StopMaxReached => Some(RunStatus::MaxReached),
        }
    }

    /// Process exit code for the CLI wrapper
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Running | RunStatus::Completed | RunStatus::StoppedEarly | RunStatus::MaxReached => 0,
            RunStatus::Failed => 1,
            RunStatus::Cancelled => 130,
        }
    }
}

/// One end-to-end invocation of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub config: RunConfig,
    iterations: Vec<Iteration>,
    status: RunStatus,
    failure: Option<String>,
    pub started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
}

impl Run {
    pub fn new(config: RunConfig) -> Self {
        Self {
            id: generate_run_id(),
            config,
            iterations: Vec::new(),
            status: RunStatus::Running,
            failure: None,
            started_at: Local::now(),
            finished_at: None,
        }
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn last_iteration(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    pub fn final_verdict(&self) -> Option<ContinuationVerdict> {
        self.last_iteration().map(|it| it.verdict)
    }

    /// Integration level of every recorded iteration, in order
    pub fn level_history(&self) -> Vec<IntegrationLevel> {
        self.iterations.iter().map(|it| it.level).collect()
    }

    /// Sequence number the next iteration will carry
    pub fn next_sequence(&self) -> u32 {
        self.iterations.len() as u32 + 1
    }

    pub fn budget_remaining(&self) -> bool {
        (self.iterations.len() as u32) < self.config.max_loops
    }

    /// Append a completed iteration. Rejected once the run is terminal or when the
    /// sequence number is out of order.
    pub(crate) fn record(&mut self, iteration: Iteration) -> Result<()> {
        if self.status.is_terminal() {
            return Err(QaLoopError::contract(format!(
                "iteration {} recorded after run reached {:?}",
                iteration.sequence, self.status
            )));
        }
        if iteration.sequence != self.next_sequence() {
            return Err(QaLoopError::contract(format!(
                "iteration sequence {} out of order, expected {}",
                iteration.sequence,
                self.next_sequence()
            )));
        }
        self.iterations.push(iteration);
        Ok(())
    }

    /// Move to a terminal status. The first terminal status wins.
    pub(crate) fn finish(&mut self, status: RunStatus, failure: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.failure = failure;
        self.finished_at = Some(Local::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_rejects_zero_budget() {
        assert!(RunConfig::new("http://localhost", 0).is_err());
        assert!(RunConfig::new("   ", 3).is_err());
        let config = RunConfig::new("http://localhost", 3).unwrap();
        assert!(config.auto_start);
        assert!(!config.verbose);
    }

    #[test]
    fn test_run_config_builders() {
        let config = RunConfig::new("http://localhost", 2)
            .unwrap()
            .with_auto_start(false)
            .with_verbose(true);
        assert!(!config.auto_start);
        assert!(config.verbose);
    }

    #[test]
    fn test_new_run_is_running() {
        let run = Run::new(RunConfig::new("http://localhost", 2).unwrap());
        assert_eq!(run.status(), RunStatus::Running);
        assert!(run.iterations().is_empty());
        assert_eq!(run.next_sequence(), 1);
        assert!(run.budget_remaining());
        assert!(run.final_verdict().is_none());
    }

    #[test]
    fn test_finish_is_sticky() {
        let mut run = Run::new(RunConfig::new("http://localhost", 2).unwrap());
        run.finish(RunStatus::Failed, Some("broken".to_string()));
        run.finish(RunStatus::Completed, None);
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.failure(), Some("broken"));
        assert!(run.finished_at().is_some());
    }

    #[test]
    fn test_status_from_verdict() {
        assert_eq!(RunStatus::from_verdict(ContinuationVerdict::Continue), None);
        assert_eq!(
            RunStatus::from_verdict(ContinuationVerdict::StopSuccess),
            Some(RunStatus::Completed)
        );
        assert_eq!(
            RunStatus::from_verdict(ContinuationVerdict::StopLowImprovement),
            Some(RunStatus::StoppedEarly)
        );
        assert_eq!(
            RunStatus::from_verdict(ContinuationVerdict::StopMaxReached),
            Some(RunStatus::MaxReached)
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Completed.exit_code(), 0);
        assert_eq!(RunStatus::StoppedEarly.exit_code(), 0);
        assert_eq!(RunStatus::MaxReached.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::Cancelled.exit_code(), 130);
    }
}
