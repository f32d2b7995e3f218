//! Continuation Decision Engine
//!
//! Rules, first match wins:
//! 1. iteration budget used up: stop-max-reached
//! 2. no failed cases: stop-success
//! 3. proposals at or below the threshold: stop-low-improvement
//! 4. otherwise continue

use crate::domain::{ContinuationVerdict, StageArtifact, StageKind};
use crate::error::{QaLoopError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRules {
    pub max_loops: u32,
    pub low_improvement_threshold: usize,
}

impl DecisionRules {
    pub fn new(max_loops: u32, low_improvement_threshold: usize) -> Self {
        Self {
            max_loops,
            low_improvement_threshold,
        }
    }

    /// Verdict for iteration `sequence`. Pure: the same artifacts always give the
    /// same verdict.
    pub fn decide(
        &self,
        sequence: u32,
        execute: Option<&StageArtifact>,
        analyze: Option<&StageArtifact>,
    ) -> Result<ContinuationVerdict> {
        let execution = execute
            .ok_or_else(|| QaLoopError::contract("decision requested without execute artifact"))?
            .as_execution()
            .ok_or_else(|| QaLoopError::contract(format!("decision expected a {} artifact", StageKind::Execute)))?;
        let analysis = analyze
            .ok_or_else(|| QaLoopError::contract("decision requested without analyze artifact"))?
            .as_analysis()
            .ok_or_else(|| QaLoopError::contract(format!("decision expected an {} artifact", StageKind::Analyze)))?;

        let verdict = if sequence >= self.max_loops {
            ContinuationVerdict::StopMaxReached
        } else if execution.tally.failed == 0 {
            ContinuationVerdict::StopSuccess
        } else if analysis.proposal_count() <= self.low_improvement_threshold {
            ContinuationVerdict::StopLowImprovement
        } else {
            ContinuationVerdict::Continue
        };

        tracing::info!(
            sequence,
            failed = execution.tally.failed,
            proposals = analysis.proposal_count(),
            verdict = %verdict,
            "Continuation decided"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CaseResult, ExecutionResult, Improvement, ImprovementAnalysis, Priority, StagePayload, TestCase,
    };
    use crate::stages::empty_artifact;

    fn execute(failed: usize) -> StageArtifact {
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
        StageArtifact::full(StagePayload::Execution(ExecutionResult::new(results, None)))
    }

    fn analyze(proposals: usize) -> StageArtifact {
        let improvements = (0..proposals)
            .map(|_| Improvement {
                category: "functional".to_string(),
                priority: Priority::Medium,
                description: String::new(),
                suggestion: String::new(),
                test_strategy: None,
            })
            .collect();
        StageArtifact::full(StagePayload::Analysis(ImprovementAnalysis::new(vec![], improvements, vec![])))
    }

    fn rules() -> DecisionRules {
        DecisionRules::new(3, 1)
    }

    #[test]
    fn test_budget_wins_over_success() {
        let verdict = rules().decide(3, Some(&execute(0)), Some(&analyze(0))).unwrap();
        assert_eq!(verdict, ContinuationVerdict::StopMaxReached);
    }

    #[test]
    fn test_zero_failures_is_success() {
        let verdict = rules().decide(1, Some(&execute(0)), Some(&analyze(5))).unwrap();
        assert_eq!(verdict, ContinuationVerdict::StopSuccess);
    }

    #[test]
    fn test_low_improvement_at_threshold() {
        assert_eq!(
            rules().decide(1, Some(&execute(2)), Some(&analyze(1))).unwrap(),
            ContinuationVerdict::StopLowImprovement
        );
        assert_eq!(
            rules().decide(1, Some(&execute(2)), Some(&analyze(0))).unwrap(),
            ContinuationVerdict::StopLowImprovement
        );
    }

    #[test]
    fn test_continue_above_threshold() {
        let verdict = rules().decide(2, Some(&execute(2)), Some(&analyze(2))).unwrap();
        assert_eq!(verdict, ContinuationVerdict::Continue);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let verdict = DecisionRules::new(5, 3)
            .decide(1, Some(&execute(1)), Some(&analyze(3)))
            .unwrap();
        assert_eq!(verdict, ContinuationVerdict::StopLowImprovement);
    }

    #[test]
    fn test_idempotent() {
        let (e, a) = (execute(1), analyze(4));
        let first = rules().decide(2, Some(&e), Some(&a)).unwrap();
        for _ in 0..3 {
            assert_eq!(rules().decide(2, Some(&e), Some(&a)).unwrap(), first);
        }
    }

    #[test]
    fn test_missing_artifacts_are_contract_violations() {
        assert!(rules().decide(1, None, Some(&analyze(1))).unwrap_err().is_contract_violation());
        assert!(rules().decide(1, Some(&execute(1)), None).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_wrong_kind_is_contract_violation() {
        let design = empty_artifact(StageKind::Design, "x");
        assert!(
            rules()
                .decide(1, Some(&design), Some(&analyze(1)))
                .unwrap_err()
                .is_contract_violation()
        );
        assert!(
            rules()
                .decide(1, Some(&execute(1)), Some(&design))
                .unwrap_err()
                .is_contract_violation()
        );
    }
}
