//! Loopback HTTP server answering suggestion requests.
//!
//! Two endpoints, both taking `{"query": "..."}`:
//!
//! - `POST /generate` returns `{"response": "<numbered list>"}`
//! - `POST /quick_suggest` returns `{"result": "<single command>"}`
//!
//! Failures are `{"error": "..."}` with a 4xx or 5xx status.

use crate::classifier::QueryClassifier;
use crate::error::GenerationError;
use crate::generation_gateway::{GenerationGateway, GenerationOptions};
use crate::prompt_builder::{self, DEFAULT_COMMAND_TYPE, PromptMode};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    gateway: GenerationGateway,
    classifier: QueryClassifier,
    system_info: Arc<str>,
    command_type: Arc<str>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        gateway: GenerationGateway,
        classifier: QueryClassifier,
        system_info: impl Into<Arc<str>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            classifier,
            system_info: system_info.into(),
            command_type: Arc::from(DEFAULT_COMMAND_TYPE),
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    async fn suggest(&self, query: &str, mode: PromptMode) -> Result<String, GenerationError> {
        let classification = self.classifier.classify(query);
        info!(
            is_git = classification.is_git,
            is_commit_message = classification.is_commit_message,
            ?mode,
            "Handling query"
        );

        let prompt = prompt_builder::build(
            query,
            classification,
            &self.command_type,
            &self.system_info,
            mode,
        );
        let options = match mode {
            PromptMode::Full => GenerationOptions::full(),
            PromptMode::Quick => GenerationOptions::quick(),
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                warn!("Request cancelled by shutdown");
                Err(GenerationError::Cancelled)
            }
            result = self.gateway.generate(&prompt, options) => result,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuickSuggestResponse {
    pub result: String,
}

#[derive(Debug)]
pub enum ApiError {
    MissingQuery,
    InvalidBody(JsonRejection),
    Generation(GenerationError),
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingQuery => (
                StatusCode::BAD_REQUEST,
                "Request body must contain a non-empty \"query\"".to_string(),
            ),
            Self::InvalidBody(rejection) => (rejection.status(), rejection.body_text()),
            Self::Generation(err) => {
                let status = match err {
                    GenerationError::BackendUnavailable | GenerationError::Cancelled => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    GenerationError::Backend(_) => StatusCode::BAD_GATEWAY,
                };
                error!("Generation failed: {}", err);
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn require_query(payload: Result<Json<QueryRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(ApiError::InvalidBody)?;
    match request.query {
        Some(query) if !query.trim().is_empty() => Ok(query),
        _ => Err(ApiError::MissingQuery),
    }
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let query = require_query(payload)?;
    let response = state.suggest(&query, PromptMode::Full).await?;
    debug!("Full response: {}", response);
    Ok(Json(GenerateResponse { response }))
}

async fn quick_suggest(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QuickSuggestResponse>, ApiError> {
    let query = require_query(payload)?;
    let result = state.suggest(&query, PromptMode::Quick).await?;
    Ok(Json(QuickSuggestResponse { result }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/quick_suggest", post(quick_suggest))
        .with_state(state)
}

/// Bind `127.0.0.1:<port>` and serve until the state's shutdown token fires.
pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{}", port))?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    info!("optionk server listening on http://{}", listener.local_addr()?);

    let token = state.shutdown_token();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}
