//! Gemini `generateContent` request and response bodies.
//!
//! Google AI Studio and Vertex AI accept the same JSON shape and differ only in
//! URL and authentication, so both backends share this module.

use crate::error::GenerationError;
use crate::generation_gateway::{ChunkStream, DecodingParams};
use crate::http_client::ByteStream;
use crate::sse::{SseEventParser, SseParser};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

// --- Request ---

#[derive(Serialize, Debug)]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize, Debug)]
struct RequestPart {
    text: String,
}

#[derive(Serialize, Debug)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize, Debug)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl GenerateContentRequest {
    pub fn new(prompt: &str, params: &DecodingParams) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                max_output_tokens: params.max_output_tokens,
            },
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, GenerationError> {
        serde_json::to_value(self).map_err(GenerationError::backend)
    }
}

// --- Response ---

#[derive(Deserialize, Debug)]
pub struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    code: Option<u16>,
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or `None` when it carries no text.
    ///
    /// API errors and blocked prompts are reported as backend errors.
    pub fn into_text(self) -> Result<Option<String>, GenerationError> {
        if let Some(api_error) = self.error {
            return Err(GenerationError::Backend(format!(
                "Gemini API error ({}): {}",
                api_error.code.unwrap_or_default(),
                api_error.message
            )));
        }

        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::Backend(format!(
                "Prompt blocked by Gemini: {}",
                reason
            )));
        }

        let Some(candidate) = self.candidates.and_then(|c| c.into_iter().next()) else {
            return Ok(None);
        };

        if let Some(reason) = candidate.finish_reason.as_deref()
            && !matches!(reason, "STOP" | "MAX_TOKENS" | "FINISH_REASON_UNSPECIFIED")
        {
            warn!("Gemini finished early: {}", reason);
        }

        let text: String = candidate
            .content
            .and_then(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        Ok((!text.is_empty()).then_some(text))
    }
}

/// Parse a complete (non-streamed) response body into its text.
pub fn parse_response(body: &str) -> Result<String, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        GenerationError::Backend(format!("Failed to parse Gemini response: {}. Body: {}", e, body))
    })?;
    debug!(?response, "Parsed Gemini response");
    Ok(response.into_text()?.unwrap_or_default())
}

/// Parse one streamed `data:` payload.
///
/// Malformed payloads, API errors and blocked prompts inside the stream are
/// backend errors, exactly as for a complete response.
pub fn parse_event(data: &str) -> Result<Option<String>, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_str(data).map_err(|e| {
        GenerationError::Backend(format!("Malformed Gemini stream event: {}. Data: {}", e, data))
    })?;
    response.into_text()
}

/// Extracts candidate text from each streamed `data:` event.
pub struct GeminiEventParser;

impl SseEventParser for GeminiEventParser {
    type Event = Result<Option<String>, GenerationError>;

    fn parse_data(&self, data: &str) -> Self::Event {
        parse_event(data)
    }
}

/// Turn an SSE byte stream from `streamGenerateContent?alt=sse` into text chunks.
pub fn into_chunk_stream(bytes: ByteStream) -> ChunkStream {
    let parser = SseParser::new(GeminiEventParser);
    bytes
        .map(Some)
        .chain(stream::once(async { None }))
        .scan(parser, |parser, item| {
            let chunks: Vec<Result<Option<String>, GenerationError>> = match item {
                Some(Ok(bytes)) => parser.parse_chunk(&bytes),
                Some(Err(e)) => vec![Err(GenerationError::backend(e))],
                None => parser.finish(),
            };
            futures_util::future::ready(Some(stream::iter(chunks)))
        })
        .flatten()
        .boxed()
}
