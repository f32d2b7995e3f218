//! In-process collaborators for driving the orchestrator without a network.
//!
//! Each mock counts its calls and can be scripted to fail, so tests can check
//! both what the loop asked for and how it degraded.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Local;

use super::{CollabResult, DesignService, ExecutionService, LlmCollaborator, PageFetcher};
use crate::artifact::html;
use crate::domain::{
    CaseResult, ExecutionResult, Improvement, ImprovementAnalysis, Priority, SpecDocument, TestCase, TestDesign,
    UiComponent,
};
use crate::error::CollaboratorError;

/// Pop the next scripted value, repeating the last one once the script runs out
fn next_scripted<T: Clone>(script: &Mutex<VecDeque<T>>, last: &Mutex<Option<T>>) -> Option<T> {
    let popped = script.lock().ok().and_then(|mut s| s.pop_front());
    match popped {
        Some(v) => {
            if let Ok(mut l) = last.lock() {
                *l = Some(v.clone());
            }
            Some(v)
        }
        None => last.lock().ok().and_then(|l| l.clone()),
    }
}

/// Serves a fixed page body, or fails as unreachable
pub struct StaticPage {
    body: Option<String>,
    calls: AtomicUsize,
}

impl StaticPage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            body: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticPage {
    async fn fetch(&self, url: &str) -> CollabResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body
            .clone()
            .ok_or_else(|| CollaboratorError::unreachable("target_page", format!("{} not served", url)))
    }
}

/// LLM stand-in: a fixed spec, and a scripted number of proposals per analysis
pub struct MockLlm {
    proposals: Mutex<VecDeque<usize>>,
    last_proposals: Mutex<Option<usize>>,
    fail: bool,
    spec_calls: AtomicUsize,
    analyze_calls: AtomicUsize,
    saw_previous: AtomicUsize,
}

impl MockLlm {
    /// Proposal counts returned by successive analyses; the last one repeats
    pub fn new(proposals: Vec<usize>) -> Self {
        Self {
            proposals: Mutex::new(proposals.into()),
            last_proposals: Mutex::new(None),
            fail: false,
            spec_calls: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
            saw_previous: AtomicUsize::new(0),
        }
    }

    /// Every call returns a malformed-response error
    pub fn malformed() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn spec_calls(&self) -> usize {
        self.spec_calls.load(Ordering::SeqCst)
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    /// Analyses that received the previous iteration's analysis as context
    pub fn calls_with_previous(&self) -> usize {
        self.saw_previous.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmCollaborator for MockLlm {
    async fn generate_spec(&self, url: &str, page: &str, components: &[UiComponent]) -> CollabResult<SpecDocument> {
        self.spec_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::malformed("llm", "scripted failure"));
        }
        Ok(SpecDocument {
            target_url: url.to_string(),
            markdown: "# Functional Specification\n\n## 1. System Overview\nMock\n".to_string(),
            components: components.to_vec(),
            features: vec![],
            scenarios: vec![],
            content_digest: Some(html::content_digest(page)),
            extracted_at: Local::now(),
        })
    }

    async fn analyze(
        &self,
        execution: &ExecutionResult,
        previous: Option<&ImprovementAnalysis>,
    ) -> CollabResult<ImprovementAnalysis> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if previous.is_some() {
            self.saw_previous.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail {
            return Err(CollaboratorError::malformed("llm", "scripted failure"));
        }

        let count = next_scripted(&self.proposals, &self.last_proposals).unwrap_or(0);
        let improvements = (0..count)
            .map(|i| Improvement {
                category: "functional".to_string(),
                priority: if i == 0 { Priority::High } else { Priority::Medium },
                description: format!("proposal {}", i + 1),
                suggestion: "fix the failing behavior".to_string(),
                test_strategy: None,
            })
            .collect();
        Ok(ImprovementAnalysis::new(execution.failures().cloned().collect(), improvements, vec![]))
    }
}

/// Design service stand-in returning a fixed case list
pub struct MockDesignService {
    cases: Option<Vec<TestCase>>,
    calls: AtomicUsize,
}

impl MockDesignService {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self {
            cases: Some(cases),
            calls: AtomicUsize::new(0),
        }
    }

    /// `count` generic cases named TC-001, TC-002, ...
    pub fn with_case_count(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| TestCase {
                    id: format!("TC-{:03}", i),
                    name: format!("designed case {}", i),
                    objective: "exercise the application".to_string(),
                    steps: vec!["open the page".to_string()],
                    expected_results: vec!["page responds".to_string()],
                    expected_element: None,
                })
                .collect(),
        )
    }

    pub fn unreachable() -> Self {
        Self {
            cases: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesignService for MockDesignService {
    async fn design(&self, _spec: &SpecDocument) -> CollabResult<TestDesign> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cases = self
            .cases
            .clone()
            .ok_or_else(|| CollaboratorError::unreachable("design_service", "connection refused"))?;
        Ok(TestDesign {
            requirements_count: cases.len(),
            cases,
            raw: None,
        })
    }
}

/// Execution service stand-in failing a scripted number of cases per call
pub struct MockExecutionService {
    failures: Mutex<VecDeque<usize>>,
    last_failures: Mutex<Option<usize>>,
    reachable: bool,
    calls: AtomicUsize,
}

impl MockExecutionService {
    /// Failed-case counts for successive executions; the last one repeats
    pub fn new(failures: Vec<usize>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            last_failures: Mutex::new(None),
            reachable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionService for MockExecutionService {
    async fn execute(&self, cases: &[TestCase], evidence_dir: Option<&Path>) -> CollabResult<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(CollaboratorError::unreachable("execution_service", "connection refused"));
        }

        let failing = next_scripted(&self.failures, &self.last_failures).unwrap_or(0);
        let results = cases
            .iter()
            .enumerate()
            .map(|(i, case)| {
                if i < failing {
                    CaseResult::failed(case, "scripted failure")
                } else {
                    CaseResult::passed(case)
                }
            })
            .collect();
        Ok(ExecutionResult::new(results, evidence_dir.map(Path::to_path_buf)))
    }
}
