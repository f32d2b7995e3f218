use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CollabResult, PageFetcher};
use crate::error::{CollaboratorError, QaLoopError, Result};

const SERVICE: &str = "target_page";

/// Plain GET of the target page; non-2xx is treated as unreachable
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QaLoopError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> CollabResult<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let body = resp.text().await.map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;
        tracing::debug!(url = %url, bytes = body.len(), "Fetched target page");
        Ok(body)
    }
}
