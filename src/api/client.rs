use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::api::types::{HealthStatus, HistoryEntry, KickoffRequest, RunStatus};
use crate::api::StatusFetcher;
use crate::error::{AppError, Result};

/// HTTP client for the review service's run endpoints.
pub struct ReviewClient {
    client: Client,
    base_url: String,
}

impl ReviewClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Start a review run for a PR revision. The service answers with the
    /// same status document shape that `/status` serves.
    pub async fn kickoff(&self, request: &KickoffRequest) -> Result<RunStatus> {
        tracing::debug!(repo = %request.repo, pr = request.pr_number, "Requesting run kickoff");
        let response = self
            .client
            .post(format!("{}/run", self.base_url))
            .json(request)
            .send()
            .await?;
        let status: RunStatus = read_json(response, "kickoff").await?;
        status.validate()?;
        Ok(status)
    }

    pub async fn status(&self, run_id: &str) -> Result<RunStatus> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .query(&[("run_id", run_id)])
            .send()
            .await?;
        let status: RunStatus = read_json(response, "status").await?;
        status.validate()?;
        Ok(status)
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let response = self
            .client
            .get(format!("{}/history", self.base_url))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let entries: Vec<HistoryEntry> = read_json(response, "history").await?;
        for entry in &entries {
            entry.validate()?;
        }
        Ok(entries)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        read_json(response, "health").await
    }
}

#[async_trait]
impl StatusFetcher for ReviewClient {
    async fn fetch_status(&self, run_id: &str) -> Result<RunStatus> {
        self.status(run_id).await
    }
}

/// Splits failures along the taxonomy: a non-success status or a body that
/// isn't JSON at all is a transport fault, while well-formed JSON that does
/// not match the expected schema is a protocol fault.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Transport(format!(
            "{what} request returned {status}: {body}"
        )));
    }
    let body = response.text().await?;
    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::Transport(format!("{what} response is not JSON: {e}")))?;
    serde_json::from_value(value)
        .map_err(|e| AppError::Protocol(format!("{what} response violates schema: {e}")))
}
