//! Calls into the generative backend with fixed, deterministic decoding.
//!
//! The rest of the server only talks to [`GenerationGateway`]; which concrete
//! [`GenerativeBackend`] sits behind it is decided once at startup.

use crate::error::GenerationError;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Streamed text chunks; `None` marks a chunk that carried no text.
pub type ChunkStream = BoxStream<'static, Result<Option<String>, GenerationError>>;

/// Decoding parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl DecodingParams {
    /// Greedy-equivalent decoding, so identical prompts give identical text.
    pub fn deterministic(max_output_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    pub streaming: bool,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    pub const FULL_MAX_OUTPUT_TOKENS: u32 = 1024;
    pub const QUICK_MAX_OUTPUT_TOKENS: u32 = 500;

    /// Numbered suggestion list, streamed.
    pub fn full() -> Self {
        Self {
            streaming: true,
            max_output_tokens: Self::FULL_MAX_OUTPUT_TOKENS,
        }
    }

    /// Single command, one shot.
    pub fn quick() -> Self {
        Self {
            streaming: false,
            max_output_tokens: Self::QUICK_MAX_OUTPUT_TOKENS,
        }
    }
}

/// A text-completion service.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<String, GenerationError>;

    async fn generate_stream(
        &self,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<ChunkStream, GenerationError>;
}

#[derive(Clone)]
pub struct GenerationGateway {
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl GenerationGateway {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        info!("Using {} backend", backend.name());
        Self {
            backend: Some(backend),
        }
    }

    /// A gateway with nothing behind it; every call fails with
    /// [`GenerationError::BackendUnavailable`].
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or(GenerationError::BackendUnavailable)?;
        let params = DecodingParams::deterministic(options.max_output_tokens);

        debug!(streaming = options.streaming, "Prompt: {}", prompt);

        let text = if options.streaming {
            let mut stream = backend.generate_stream(prompt, &params).await?;
            let mut full_response = String::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(Some(text)) => full_response.push_str(&text),
                    Ok(None) => {}
                    Err(e) => {
                        error!("{} stream failed: {}", backend.name(), e);
                        return Err(e);
                    }
                }
            }
            full_response
        } else {
            backend.generate(prompt, &params).await.inspect_err(|e| {
                error!("{} request failed: {}", backend.name(), e);
            })?
        };

        Ok(trim_response(&text).to_string())
    }
}

/// Strip surrounding backticks and whitespace from backend output.
pub fn trim_response(text: &str) -> &str {
    text.trim_matches(|c| matches!(c, '`' | ' ' | '\t' | '\n' | '\r'))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Deterministic stand-in for a real backend.
    ///
    /// Answers every prompt with the same text, split into `chunks` when
    /// streaming, and records the parameters it was called with.
    pub struct StubBackend {
        pub reply: String,
        pub chunks: Vec<Option<String>>,
        pub fail: bool,
        pub calls: Mutex<Vec<(String, DecodingParams, bool)>>,
    }

    impl StubBackend {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                chunks: vec![Some(reply.to_string())],
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn streaming(chunks: Vec<Option<&str>>) -> Self {
            Self {
                reply: String::new(),
                chunks: chunks.into_iter().map(|c| c.map(str::to_string)).collect(),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::replying("")
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn generate(
            &self,
            prompt: &str,
            params: &DecodingParams,
        ) -> Result<String, GenerationError> {
            self.calls.lock().unwrap().push((prompt.to_string(), *params, false));
            if self.fail {
                return Err(GenerationError::Backend("stub failure".to_string()));
            }
            Ok(self.reply.clone())
        }

        async fn generate_stream(
            &self,
            prompt: &str,
            params: &DecodingParams,
        ) -> Result<ChunkStream, GenerationError> {
            self.calls.lock().unwrap().push((prompt.to_string(), *params, true));
            if self.fail {
                return Err(GenerationError::Backend("stub failure".to_string()));
            }
            let chunks: Vec<Result<Option<String>, GenerationError>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(futures_util::stream::iter(chunks).boxed())
        }
    }

    #[tokio::test]
    async fn test_identical_prompts_give_identical_text() {
        let gateway = GenerationGateway::new(Arc::new(StubBackend::replying("  `ls -la`\n")));

        let first = gateway.generate("list files", GenerationOptions::quick()).await.unwrap();
        let second = gateway.generate("list files", GenerationOptions::quick()).await.unwrap();

        assert_eq!(first, "ls -la");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_decoding_parameters_are_fixed() {
        let backend = Arc::new(StubBackend::replying("ok"));
        let gateway = GenerationGateway::new(backend.clone());

        gateway.generate("p", GenerationOptions::quick()).await.unwrap();
        gateway.generate("p", GenerationOptions::full()).await.unwrap();

        let calls = backend.calls.lock().unwrap();
        let (_, quick, quick_streamed) = calls[0].clone();
        let (_, full, full_streamed) = calls[1].clone();
        assert_eq!(quick, DecodingParams::deterministic(500));
        assert_eq!(full, DecodingParams::deterministic(1024));
        assert_eq!(quick.temperature, 0.0);
        assert_eq!(quick.top_p, 1.0);
        assert_eq!(quick.top_k, 1);
        assert!(!quick_streamed);
        assert!(full_streamed);
    }

    #[tokio::test]
    async fn test_stream_chunks_are_concatenated_in_order_skipping_empty() {
        let backend = StubBackend::streaming(vec![
            Some("```\n0. ls"),
            None,
            Some(""),
            Some(" - list files\n"),
            Some("1. pwd - print directory\n```"),
        ]);
        let gateway = GenerationGateway::new(Arc::new(backend));

        let text = gateway.generate("p", GenerationOptions::full()).await.unwrap();

        assert_eq!(text, "0. ls - list files\n1. pwd - print directory");
    }

    #[tokio::test]
    async fn test_missing_backend_is_unavailable() {
        let gateway = GenerationGateway::unavailable();
        let err = gateway.generate("p", GenerationOptions::full()).await.unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable));
    }

    #[tokio::test]
    async fn test_backend_failure_is_propagated() {
        let gateway = GenerationGateway::new(Arc::new(StubBackend::failing()));
        let err = gateway.generate("p", GenerationOptions::quick()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend(_)));
    }

    #[test]
    fn test_trim_response_strips_fences_and_whitespace() {
        assert_eq!(trim_response("```\ngit log --oneline\n```"), "git log --oneline");
        assert_eq!(trim_response("echo 'a`b' | tr a b"), "echo 'a`b' | tr a b");
        assert_eq!(trim_response(" \t\r\n"), "");
    }
}
