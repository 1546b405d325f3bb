//! Completion collaborator
//!
//! Turns a transcript into one assistant reply or an error.

mod error;
mod models;
mod openai;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use models::{Model, UnsupportedModel, SUPPORTED_MODELS};
pub use openai::{OpenAiClient, DEFAULT_BASE_URL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one request/response round trip
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        (**self).complete(request).await
    }
}

/// Environment-derived settings for the completion provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Seeds the configuration store when it has no key yet
    pub openai_api_key: Option<String>,
    /// Alternative API origin (proxy, local mock)
    pub base_url: Option<String>,
    /// Seeds the stored model when none is set
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            default_model: std::env::var("SUMMARIZER_MODEL").ok(),
        }
    }
}

/// Logging wrapper for completion clients
pub struct LoggingClient {
    inner: Arc<dyn CompletionClient>,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionClient for LoggingClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    turns = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    empty = response.text.is_empty(),
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Completion failed"
                );
            }
        }

        result
    }
}
