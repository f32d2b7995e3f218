//! Bounded-timeout reachability checks against the three collaborators.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::CollaboratorsConfig;
use crate::domain::Reachability;
use crate::error::{QaLoopError, Result};

/// Checks which collaborators are reachable right now.
///
/// Implementations never fail: any error counts as unreachable.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Reachability;
}

/// GET `url` and report whether a 2xx came back within the client timeout
pub async fn check_endpoint(client: &Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            tracing::debug!(url = %url, status = %resp.status(), "Probe got non-success status");
            false
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Probe failed");
            false
        }
    }
}

/// HTTP probe reading endpoints from the immutable collaborator config
pub struct HttpHealthProbe {
    client: Client,
    llm_url: String,
    design_url: String,
    execution_url: String,
}

impl HttpHealthProbe {
    pub fn new(config: &CollaboratorsConfig) -> Result<Self> {
        Self::with_timeout(config, config.probe_timeout())
    }

    pub fn with_timeout(config: &CollaboratorsConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QaLoopError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            // Ollama answers on /api/tags; the services answer on their index page
            llm_url: format!("{}/api/tags", config.llm_url.trim_end_matches('/')),
            design_url: config.design_url.clone(),
            execution_url: config.execution_url.clone(),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Reachability {
        let (llm, design_service, execution_service) = futures::future::join3(
            check_endpoint(&self.client, &self.llm_url),
            check_endpoint(&self.client, &self.design_url),
            check_endpoint(&self.client, &self.execution_url),
        )
        .await;

        let result = Reachability::new(llm, design_service, execution_service);
        tracing::info!(reachability = %result, "Collaborator probe complete");
        result
    }
}

/// Probe that replays a fixed script, repeating the last entry once exhausted.
/// Useful for simulating collaborators that fail or recover mid-run.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Reachability>>,
    last: Mutex<Reachability>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Reachability>) -> Self {
        let last = script.last().copied().unwrap_or_default();
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
        }
    }

    /// Always reports the same reachability
    pub fn constant(reachability: Reachability) -> Self {
        Self::new(vec![reachability])
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> Reachability {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(r) => {
                if let Ok(mut last) = self.last.lock() {
                    *last = r;
                }
                r
            }
            None => self.last.lock().map(|l| *l).unwrap_or_default(),
        }
    }
}
