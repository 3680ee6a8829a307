//! Google AI Studio (Generative Language API) backend.

use super::gemini_wire::{self, GenerateContentRequest};
use crate::error::GenerationError;
use crate::generation_gateway::{ChunkStream, DecodingParams, GenerativeBackend};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleAiStudioBackend {
    api_key: String,
    model: String,
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl GoogleAiStudioBackend {
    pub fn new(api_key: String, model: String, http: Arc<dyn HttpClient>) -> Self {
        Self {
            api_key,
            model,
            base_url: BASE_URL.to_string(),
            http,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

#[async_trait]
impl GenerativeBackend for GoogleAiStudioBackend {
    fn name(&self) -> &'static str {
        "google_ai_studio"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        let body = GenerateContentRequest::new(prompt, params).to_json()?;
        info!("Calling Google AI Studio model {}", self.model);

        let response = self
            .http
            .post_json(
                &self.url("generateContent"),
                &[("x-goog-api-key", self.api_key.as_str())],
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
        info!("Streaming from Google AI Studio model {}", self.model);

        let bytes = self
            .http
            .post_json_stream(
                &self.url("streamGenerateContent?alt=sse"),
                &[("x-goog-api-key", self.api_key.as_str())],
                &body,
            )
            .await
            .map_err(GenerationError::backend)?;

        Ok(gemini_wire::into_chunk_stream(bytes))
    }
}
