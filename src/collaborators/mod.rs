//! Collaborator Layer - the external capabilities the pipeline stages call into
//!
//! This module provides:
//! - One narrow async trait per collaborator
//! - HTTP implementations (Ollama, design service, execution service, page fetch)
//! - In-process mocks for driving the orchestrator without a network

pub mod design;
pub mod execution;
pub mod mock;
pub mod ollama;
pub mod page;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CollaboratorsConfig;
use crate::domain::{ExecutionResult, ImprovementAnalysis, SpecDocument, TestCase, TestDesign, UiComponent};
use crate::error::{CollaboratorError, Result};

pub use design::HttpDesignService;
pub use execution::HttpExecutionService;
pub use mock::{MockDesignService, MockExecutionService, MockLlm, StaticPage};
pub use ollama::OllamaClient;
pub use page::HttpPageFetcher;

/// Result of a single collaborator call
pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// Fetches the raw HTML of the target application
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CollabResult<String>;
}

/// Language model used for spec synthesis and failure analysis
#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    /// Build a behavioral specification from a fetched page
    async fn generate_spec(&self, url: &str, html: &str, components: &[UiComponent]) -> CollabResult<SpecDocument>;

    /// Explain failures and propose improvements, with the previous iteration's
    /// analysis as context
    async fn analyze(
        &self,
        execution: &ExecutionResult,
        previous: Option<&ImprovementAnalysis>,
    ) -> CollabResult<ImprovementAnalysis>;
}

/// Test-design service: specification in, test cases out
#[async_trait]
pub trait DesignService: Send + Sync {
    async fn design(&self, spec: &SpecDocument) -> CollabResult<TestDesign>;
}

/// Test-execution service: test cases in, per-case results out
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, cases: &[TestCase], evidence_dir: Option<&Path>) -> CollabResult<ExecutionResult>;
}

/// The full set of collaborators handed to the loop controller
#[derive(Clone)]
pub struct Collaborators {
    pub page: Arc<dyn PageFetcher>,
    pub llm: Arc<dyn LlmCollaborator>,
    pub design: Arc<dyn DesignService>,
    pub execution: Arc<dyn ExecutionService>,
}

impl Collaborators {
    /// HTTP clients for every collaborator, endpoints and timeouts from config
    pub fn http(config: &CollaboratorsConfig) -> Result<Self> {
        Ok(Self {
            page: Arc::new(HttpPageFetcher::new(config.page_timeout())?),
            llm: Arc::new(OllamaClient::new(config)?),
            design: Arc::new(HttpDesignService::new(config)?),
            execution: Arc::new(HttpExecutionService::new(config)?),
        })
    }
}

/// Pull the outermost JSON object out of free-form model output.
///
/// Models wrap JSON in prose or code fences; everything before the first `{`
/// and after the last `}` is dropped.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
