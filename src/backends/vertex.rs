//! Vertex AI backend.
//!
//! Requests are authorized with an OAuth access token. The token comes from
//! `VERTEX_ACCESS_TOKEN` when set, otherwise from the gcloud CLI using the
//! caller's application credentials.

use super::gemini_wire::{self, GenerateContentRequest};
use crate::error::GenerationError;
use crate::generation_gateway::{ChunkStream, DecodingParams, GenerativeBackend};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};
use which::which;

/// Source of bearer tokens for Vertex AI.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, GenerationError>;
}

/// Reads `VERTEX_ACCESS_TOKEN`, falling back to `gcloud auth print-access-token`.
pub struct GcloudTokenSource;

#[async_trait]
impl AccessTokenSource for GcloudTokenSource {
    async fn access_token(&self) -> Result<String, GenerationError> {
        if let Ok(token) = std::env::var("VERTEX_ACCESS_TOKEN")
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_string());
        }

        let gcloud = which("gcloud").map_err(|_| {
            GenerationError::Backend(
                "gcloud CLI not found; install it or set VERTEX_ACCESS_TOKEN".to_string(),
            )
        })?;

        debug!("Requesting access token from {}", gcloud.display());
        let output = Command::new(gcloud)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(GenerationError::backend)?;

        if !output.status.success() {
            return Err(GenerationError::Backend(format!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(GenerationError::Backend(
                "gcloud returned an empty access token".to_string(),
            ));
        }
        Ok(token)
    }
}

pub struct VertexBackend {
    project: String,
    location: String,
    model: String,
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenSource>,
}

impl VertexBackend {
    pub fn new(
        project: String,
        location: String,
        model: String,
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            project,
            location,
            model,
            http,
            tokens,
        }
    }

    fn url(&self, method: &str) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:{method}",
            loc = self.location,
            project = self.project,
            model = self.model,
        )
    }

    async fn authorization(&self) -> Result<String, GenerationError> {
        Ok(format!("Bearer {}", self.tokens.access_token().await?))
    }
}

#[async_trait]
impl GenerativeBackend for VertexBackend {
    fn name(&self) -> &'static str {
        "vertexai"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        let body = GenerateContentRequest::new(prompt, params).to_json()?;
        let authorization = self.authorization().await?;
        info!("Calling Vertex AI model {} in {}", self.model, self.location);

        let response = self
            .http
            .post_json(
                &self.url("generateContent"),
                &[("Authorization", authorization.as_str())],
                &body,
            )
            .await
            .map_err(GenerationError::backend)?;

        gemini_wire::parse_response(&response)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<ChunkStream, GenerationError> {
        let body = GenerateContentRequest::new(prompt, params).to_json()?;
        let authorization = self.authorization().await?;
        info!("Streaming from Vertex AI model {} in {}", self.model, self.location);

        let bytes = self
            .http
            .post_json_stream(
                &self.url("streamGenerateContent?alt=sse"),
                &[("Authorization", authorization.as_str())],
                &body,
            )
            .await
            .map_err(GenerationError::backend)?;

        Ok(gemini_wire::into_chunk_stream(bytes))
    }
}
