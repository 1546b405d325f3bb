//! Common types for completion exchanges

use super::Model;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Max tokens requested for every exchange
pub const MAX_TOKENS: u32 = 500;

/// Sampling temperature for every exchange
pub const TEMPERATURE: f32 = 0.3;

/// One completion request: system directive plus role-tagged turns
#[derive(Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Model,
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Credential read from the configuration shadow when the request was built
    pub api_key: String,
}

impl CompletionRequest {
    pub fn new(
        model: Model,
        system: impl Into<String>,
        messages: Vec<LlmMessage>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model,
            system: system.into(),
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("model", &self.model)
            .field("system", &self.system)
            .field("messages", &self.messages)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Message in an outgoing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Completion result. `text` may be empty; that is not an error.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Usage,
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
