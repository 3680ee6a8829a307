//! Concrete [`GenerativeBackend`] implementations.

pub mod gemini_wire;
pub mod google_ai_studio;
pub mod vertex;

use crate::config::BackendSettings;
use crate::generation_gateway::GenerativeBackend;
use crate::http_client::HttpClient;
use std::sync::Arc;

pub use google_ai_studio::GoogleAiStudioBackend;
pub use vertex::{AccessTokenSource, GcloudTokenSource, VertexBackend};

/// Build the backend selected by the configuration.
pub fn from_settings(
    settings: &BackendSettings,
    http: Arc<dyn HttpClient>,
) -> Arc<dyn GenerativeBackend> {
    match settings {
        BackendSettings::Vertex {
            project,
            location,
            model,
        } => Arc::new(VertexBackend::new(
            project.clone(),
            location.clone(),
            model.clone(),
            http,
            Arc::new(GcloudTokenSource),
        )),
        BackendSettings::GoogleAiStudio { api_key, model } => Arc::new(
            GoogleAiStudioBackend::new(api_key.clone(), model.clone(), http),
        ),
    }
}
