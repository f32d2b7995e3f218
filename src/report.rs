//! Run Report Aggregator
//!
//! A pure transformation over a finished [`Run`]: per-iteration summaries plus
//! run-wide totals and trends.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ContinuationVerdict, IntegrationLevel, Iteration, Provenance, Reachability, Run, RunStatus, StageKind, Tally,
};

/// Recommendations carried into the report from the last analysis
const MAX_RECOMMENDATIONS: usize = 3;

const STABLE_MESSAGE: &str = "The system is stable; continued monitoring is recommended.";
const NO_DATA_MESSAGE: &str = "Not enough data to make recommendations.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub kind: StageKind,
    pub provenance: Provenance,
    pub success: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub sequence: u32,
    pub dir_name: String,
    pub reachability: Reachability,
    pub level: IntegrationLevel,
    pub stages: Vec<StageSummary>,
    pub tally: Tally,
    pub proposal_count: usize,
    pub verdict: ContinuationVerdict,
    /// Whether the target page differs from the previous iteration's; None when
    /// there is nothing to compare
    pub page_changed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tests_run: usize,
    pub total_failures: usize,
    /// Percentage of tests that passed across all iterations
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementTrend {
    /// Failed cases per iteration, in order
    pub failure_trend: Vec<usize>,
    pub improvement_detected: bool,
    pub stability_achieved: bool,
    pub total_proposals: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub max_loops: u32,
    /// LLM reachability in the last probe
    pub llm_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub target_url: String,
    pub status: RunStatus,
    pub total_iterations: usize,
    pub level_history: Vec<IntegrationLevel>,
    pub final_verdict: Option<ContinuationVerdict>,
    pub failure: Option<String>,
    pub iterations: Vec<IterationSummary>,
    pub execution: ExecutionSummary,
    pub trend: ImprovementTrend,
    pub recommendations: Vec<String>,
    pub system_config: SystemConfig,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub generated_at: DateTime<Local>,
}

fn digest(iteration: &Iteration) -> Option<&str> {
    iteration.extract.as_spec().and_then(|s| s.content_digest.as_deref())
}

fn summarize(iteration: &Iteration, previous: Option<&Iteration>) -> IterationSummary {
    let page_changed = match (previous.and_then(digest), digest(iteration)) {
        (Some(before), Some(now)) => Some(before != now),
        _ => None,
    };

    IterationSummary {
        sequence: iteration.sequence,
        dir_name: iteration.dir_name.clone(),
        reachability: iteration.reachability,
        level: iteration.level,
        stages: iteration
            .artifacts()
            .iter()
            .map(|a| StageSummary {
                kind: a.kind(),
                provenance: a.provenance(),
                success: a.success(),
                note: a.note().map(String::from),
            })
            .collect(),
        tally: iteration.execute.as_execution().map(|e| e.tally).unwrap_or_default(),
        proposal_count: iteration.analyze.as_analysis().map(|a| a.proposal_count()).unwrap_or(0),
        verdict: iteration.verdict,
        page_changed,
    }
}

fn recommendations(run: &Run) -> Vec<String> {
    let Some(last) = run.last_iteration() else {
        return vec![NO_DATA_MESSAGE.to_string()];
    };

    let recs: Vec<String> = last
        .analyze
        .as_analysis()
        .map(|a| {
            a.improvements
                .iter()
                .take(MAX_RECOMMENDATIONS)
                .map(|i| format!("{}: {}", i.category, i.description))
                .collect()
        })
        .unwrap_or_default();

    if recs.is_empty() {
        vec![STABLE_MESSAGE.to_string()]
    } else {
        recs
    }
}

impl RunReport {
    pub fn from_run(run: &Run) -> Self {
        let iterations: Vec<IterationSummary> = run
            .iterations()
            .iter()
            .enumerate()
            .map(|(i, it)| summarize(it, i.checked_sub(1).map(|p| &run.iterations()[p])))
            .collect();

        let total_tests_run: usize = iterations.iter().map(|s| s.tally.total).sum();
        let total_failures: usize = iterations.iter().map(|s| s.tally.failed).sum();
        let success_rate = if total_tests_run > 0 {
            (total_tests_run - total_failures) as f64 / total_tests_run as f64 * 100.0
        } else {
            0.0
        };

        let failure_trend: Vec<usize> = iterations.iter().map(|s| s.tally.failed).collect();
        let improvement_detected = match (failure_trend.first(), failure_trend.last()) {
            (Some(first), Some(last)) if failure_trend.len() > 1 => last < first,
            _ => false,
        };
        let stability_achieved = failure_trend.last() == Some(&0);

        RunReport {
            run_id: run.id.clone(),
            target_url: run.config.target_url.clone(),
            status: run.status(),
            total_iterations: iterations.len(),
            level_history: run.level_history(),
            final_verdict: run.final_verdict(),
            failure: run.failure().map(String::from),
            execution: ExecutionSummary {
                total_tests_run,
                total_failures,
                success_rate,
            },
            trend: ImprovementTrend {
                total_proposals: iterations.iter().map(|s| s.proposal_count).sum(),
                failure_trend,
                improvement_detected,
                stability_achieved,
            },
            recommendations: recommendations(run),
            system_config: SystemConfig {
                max_loops: run.config.max_loops,
                llm_available: run.last_iteration().map(|it| it.reachability.llm).unwrap_or(false),
            },
            iterations,
            started_at: run.started_at,
            finished_at: run.finished_at(),
            generated_at: Local::now(),
        }
    }

    /// Iterations in which at least one stage ran its fallback
    pub fn degraded_iterations(&self) -> usize {
        self.iterations
            .iter()
            .filter(|s| s.stages.iter().any(|st| st.provenance == Provenance::Fallback))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CaseResult, ExecutionResult, Improvement, ImprovementAnalysis, Priority, RunConfig, SpecDocument,
        StageArtifact, StagePayload, TestCase, TestDesign,
    };
    use crate::integration::resolve;

    fn spec(digest: Option<&str>) -> StageArtifact {
        StageArtifact::full(StagePayload::Spec(SpecDocument {
            target_url: "http://app".to_string(),
            markdown: String::new(),
            components: vec![],
            features: vec![],
            scenarios: vec![],
            content_digest: digest.map(String::from),
            extracted_at: Local::now(),
        }))
    }

    fn iteration(sequence: u32, failed: usize, proposals: usize, digest: Option<&str>) -> Iteration {
        let case = TestCase {
            id: "TC-001".to_string(),
            name: "x".to_string(),
            objective: String::new(),
            steps: vec![],
            expected_results: vec![],
            expected_element: None,
        };
        let mut results: Vec<_> = (0..failed).map(|_| CaseResult::failed(&case, "no")).collect();
        results.push(CaseResult::passed(&case));
        let improvements = (0..proposals)
            .map(|i| Improvement {
                category: "ui".to_string(),
                priority: Priority::Low,
                description: format!("fix {}", i),
                suggestion: String::new(),
                test_strategy: None,
            })
            .collect();
        let reachability = Reachability::new(true, false, true);

        Iteration {
            sequence,
            started_at: Local::now(),
            dir_name: format!("loop-{:03}_x", sequence),
            reachability,
            level: resolve(&reachability),
            extract: spec(digest),
            design: StageArtifact::fallback(StagePayload::Design(TestDesign::default()), true, "templates"),
            execute: StageArtifact::full(StagePayload::Execution(ExecutionResult::new(results, None))),
            analyze: StageArtifact::full(StagePayload::Analysis(ImprovementAnalysis::new(
                vec![],
                improvements,
                vec![],
            ))),
            verdict: ContinuationVerdict::Continue,
        }
    }

    fn run_with(iterations: Vec<Iteration>) -> Run {
        let mut run = Run::new(RunConfig::new("http://app", 5).unwrap());
        for it in iterations {
            run.record(it).unwrap();
        }
        run.finish(RunStatus::MaxReached, None);
        run
    }

    #[test]
    fn test_totals_and_trend() {
        let run = run_with(vec![
            iteration(1, 3, 5, Some("a")),
            iteration(2, 1, 4, Some("a")),
            iteration(3, 0, 0, Some("b")),
        ]);
        let report = RunReport::from_run(&run);

        assert_eq!(report.total_iterations, 3);
        assert_eq!(report.execution.total_tests_run, 7);
        assert_eq!(report.execution.total_failures, 4);
        assert!((report.execution.success_rate - 300.0 / 7.0).abs() < 1e-9);
        assert_eq!(report.trend.failure_trend, vec![3, 1, 0]);
        assert!(report.trend.improvement_detected);
        assert!(report.trend.stability_achieved);
        assert_eq!(report.trend.total_proposals, 9);
        assert_eq!(report.level_history, vec![IntegrationLevel::Partial; 3]);
        assert_eq!(report.status, RunStatus::MaxReached);
    }

    #[test]
    fn test_page_changed_between_iterations() {
        let run = run_with(vec![
            iteration(1, 1, 2, Some("a")),
            iteration(2, 1, 2, Some("a")),
            iteration(3, 1, 2, Some("b")),
            iteration(4, 1, 2, None),
        ]);
        let changed: Vec<_> = RunReport::from_run(&run).iterations.iter().map(|s| s.page_changed).collect();
        assert_eq!(changed, vec![None, Some(false), Some(true), None]);
    }

    #[test]
    fn test_recommendations_capped_at_three() {
        let run = run_with(vec![iteration(1, 2, 5, None)]);
        let report = RunReport::from_run(&run);
        assert_eq!(report.recommendations, vec!["ui: fix 0", "ui: fix 1", "ui: fix 2"]);
    }

    #[test]
    fn test_default_recommendation_when_stable() {
        let report = RunReport::from_run(&run_with(vec![iteration(1, 0, 0, None)]));
        assert_eq!(report.recommendations, vec![STABLE_MESSAGE]);
        assert!(!report.trend.improvement_detected);
    }

    #[test]
    fn test_empty_run_report() {
        let mut run = Run::new(RunConfig::new("http://app", 2).unwrap());
        run.finish(RunStatus::Cancelled, None);
        let report = RunReport::from_run(&run);
        assert_eq!(report.total_iterations, 0);
        assert_eq!(report.execution.success_rate, 0.0);
        assert!(!report.trend.stability_achieved);
        assert_eq!(report.recommendations, vec![NO_DATA_MESSAGE]);
        assert!(!report.system_config.llm_available);
        assert!(report.final_verdict.is_none());
    }

    #[test]
    fn test_stage_summaries_and_degradation() {
        let report = RunReport::from_run(&run_with(vec![iteration(1, 1, 2, None)]));
        let stages = &report.iterations[0].stages;
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[1].kind, StageKind::Design);
        assert_eq!(stages[1].provenance, Provenance::Fallback);
        assert_eq!(stages[1].note.as_deref(), Some("templates"));
        assert_eq!(report.degraded_iterations(), 1);
        assert!(report.system_config.llm_available);
    }

    #[test]
    fn test_failure_diagnostic_carried() {
        let mut run = Run::new(RunConfig::new("http://app", 2).unwrap());
        run.finish(RunStatus::Failed, Some("Contract violation: broken".to_string()));
        let report = RunReport::from_run(&run);
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.failure.as_deref(), Some("Contract violation: broken"));
    }
}
