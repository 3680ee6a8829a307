//! Client side of the loopback HTTP interface.

use crate::http_client::{HttpClient, HttpStatusError};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Where suggestions come from, as seen by the interactive session.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Raw numbered-list text for `query` (full mode).
    async fn suggestions(&self, query: &str) -> Result<String>;

    /// A single command for `query` (quick mode).
    async fn quick_suggestion(&self, query: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct QuickSuggestResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct SuggestionClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl SuggestionClient {
    pub fn new(port: u16, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, query: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        self.http
            .post_json(&url, &[], &json!({ "query": query }))
            .await
            .map_err(|e| self.describe_failure(e))
    }

    fn describe_failure(&self, err: anyhow::Error) -> anyhow::Error {
        match err.downcast_ref::<HttpStatusError>() {
            Some(status) => {
                let message = serde_json::from_str::<ErrorResponse>(&status.body)
                    .map(|body| body.error)
                    .unwrap_or_else(|_| status.body.clone());
                anyhow!("Server error ({}): {}", status.status, message)
            }
            None => err.context(format!(
                "Could not reach the optionk server at {}; is opk-server running?",
                self.base_url
            )),
        }
    }
}

#[async_trait]
impl SuggestionSource for SuggestionClient {
    async fn suggestions(&self, query: &str) -> Result<String> {
        let body = self.post("/generate", query).await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Unexpected response from /generate")?;
        Ok(parsed.response)
    }

    async fn quick_suggestion(&self, query: &str) -> Result<String> {
        let body = self.post("/quick_suggest", query).await?;
        let parsed: QuickSuggestResponse =
            serde_json::from_str(&body).context("Unexpected response from /quick_suggest")?;
        Ok(parsed.result)
    }
}
