//! Typed payloads produced by the four pipeline stages.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//=== Extract ===

/// Kind of structural element found on the target page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Form,
    Navigation,
    Button,
    Table,
    Heading,
    Link,
}

impl ComponentKind {
    /// Element key used by shallow presence checks (see `artifact::html::has_element`)
    pub fn element_key(&self) -> &'static str {
        match self {
            ComponentKind::Form => "form",
            ComponentKind::Navigation => "nav",
            ComponentKind::Button => "button",
            ComponentKind::Table => "table",
            ComponentKind::Heading => "heading",
            ComponentKind::Link => "a",
        }
    }
}

/// One UI element discovered on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiComponent {
    pub kind: ComponentKind,
    /// Visible text, action, or other short identifying label
    pub label: String,
    /// Kind-specific size: inputs of a form, links in a nav, rows of a table
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScenario {
    pub scenario: String,
    pub steps: Vec<String>,
    pub expected_outcome: String,
}

/// Behavioral specification of the target application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecDocument {
    pub target_url: String,
    /// Markdown specification text
    pub markdown: String,
    pub components: Vec<UiComponent>,
    pub features: Vec<Feature>,
    pub scenarios: Vec<UserScenario>,
    /// SHA-256 of the fetched page, None when the page could not be fetched
    pub content_digest: Option<String>,
    pub extracted_at: DateTime<Local>,
}

//=== Design ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub objective: String,
    pub steps: Vec<String>,
    pub expected_results: Vec<String>,
    /// Element key that must be present on the page for a shallow check to pass
    #[serde(default)]
    pub expected_element: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestDesign {
    pub cases: Vec<TestCase>,
    pub requirements_count: usize,
    /// Raw design document returned by the design service, if any
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

//=== Execute ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl CaseStatus {
    /// Lenient mapping from a collaborator status string
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "passed" | "pass" | "completed" | "success" => CaseStatus::Passed,
            "failed" | "fail" => CaseStatus::Failed,
            "skipped" | "skip" => CaseStatus::Skipped,
            _ => CaseStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub name: String,
    pub status: CaseStatus,
    pub failure_reason: Option<String>,
}

impl CaseResult {
    pub fn passed(case: &TestCase) -> Self {
        Self {
            case_id: case.id.clone(),
            name: case.name.clone(),
            status: CaseStatus::Passed,
            failure_reason: None,
        }
    }

    pub fn failed(case: &TestCase, reason: impl Into<String>) -> Self {
        Self {
            case_id: case.id.clone(),
            name: case.name.clone(),
            status: CaseStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Pass/fail counts. Anything that did not pass counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    pub fn from_results(results: &[CaseResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.status == CaseStatus::Passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub results: Vec<CaseResult>,
    pub tally: Tally,
    pub evidence_dir: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn new(results: Vec<CaseResult>, evidence_dir: Option<PathBuf>) -> Self {
        let tally = Tally::from_results(&results);
        Self {
            results,
            tally,
            evidence_dir,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| r.status != CaseStatus::Passed)
    }
}

//=== Analyze ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "高" => Priority::High,
            "low" | "低" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub category: String,
    pub priority: Priority,
    pub description: String,
    pub suggestion: String,
    pub test_strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub issue: String,
    pub cause: String,
    pub impact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Medium,
    High,
}

/// Goals carried into the next iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextIterationPlan {
    pub focus_areas: Vec<String>,
    pub priority_improvements: Vec<Improvement>,
    pub test_strategy_updates: Vec<String>,
    pub estimated_effort: Effort,
}

impl NextIterationPlan {
    pub fn from_improvements(improvements: &[Improvement]) -> Self {
        Self {
            focus_areas: improvements.iter().map(|i| i.category.clone()).collect(),
            priority_improvements: improvements
                .iter()
                .filter(|i| i.priority == Priority::High)
                .cloned()
                .collect(),
            test_strategy_updates: improvements.iter().filter_map(|i| i.test_strategy.clone()).collect(),
            estimated_effort: if improvements.len() <= 3 {
                Effort::Medium
            } else {
                Effort::High
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementAnalysis {
    pub failed_cases: Vec<CaseResult>,
    pub improvements: Vec<Improvement>,
    pub root_causes: Vec<RootCause>,
    pub next_plan: NextIterationPlan,
    pub analyzed_at: DateTime<Local>,
}

impl ImprovementAnalysis {
    pub fn new(failed_cases: Vec<CaseResult>, improvements: Vec<Improvement>, root_causes: Vec<RootCause>) -> Self {
        let next_plan = NextIterationPlan::from_improvements(&improvements);
        Self {
            failed_cases,
            improvements,
            root_causes,
            next_plan,
            analyzed_at: Local::now(),
        }
    }

    pub fn proposal_count(&self) -> usize {
        self.improvements.len()
    }
}
