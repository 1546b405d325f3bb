//! Effects produced by state transitions

use crate::config::Configuration;
use crate::error::SummarizerError;
use crate::llm::{CompletionRequest, MessageRole};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the transcript with an empty one
    ResetTranscript,

    /// Append a message to the transcript
    AppendMessage {
        role: MessageRole,
        content: String,
        is_error: bool,
    },

    /// Start the single outstanding completion exchange
    RequestCompletion { request: CompletionRequest },

    /// Refresh the cached configuration shadow
    UpdateConfig { config: Configuration },
}

impl Effect {
    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::User,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    /// Error shown as an assistant message, marked as an error
    pub fn append_error(error: &SummarizerError) -> Self {
        Effect::AppendMessage {
            role: MessageRole::Assistant,
            content: error.user_text(),
            is_error: true,
        }
    }
}
