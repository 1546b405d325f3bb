//! User-facing error taxonomy
//!
//! Every failure that reaches the user ends up as one of these variants and
//! is rendered into the transcript as an error message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to the user through the transcript
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarizerError {
    /// Selection-menu activation without any selected text
    #[error("No text selected to summarize.")]
    NoTextSelected,

    /// No API key stored; detected before any network call
    #[error("No OpenAI API key set. Click the extension icon to configure it.")]
    MissingApiKey,

    /// Completion collaborator failed (non-success status, malformed body)
    #[error("{message}")]
    Completion { message: String },

    /// Listener could not be injected into the target context
    #[error("This page can't be reached by the summarizer. Try another tab.")]
    InjectionFailed,

    /// No listener in the target context. Absorbed by the dispatcher's retry
    /// and only surfaced when the retry also misses.
    #[error("The page did not respond. Reload it and try again.")]
    NoReceiver,
}

impl SummarizerError {
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
        }
    }

    /// Text appended to the transcript for this error
    pub fn user_text(&self) -> String {
        render_error(&self.to_string())
    }
}

/// Render an arbitrary error message the way the transcript shows it
pub fn render_error(message: &str) -> String {
    format!("Error: {message}")
}
