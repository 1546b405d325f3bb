//! Transcript: append-only message history of one session

use crate::llm::{LlmMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown when the model returns an empty reply
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary returned.";

/// One entry in the transcript. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: MessageRole,
    pub content: String,
    /// Rendered error rather than a model reply
    #[serde(default)]
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

/// Ordered message history.
///
/// Ids come from a counter owned by the transcript and keep increasing across
/// [`clear`](Transcript::clear), so two appends can never share an id.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>, is_error: bool) -> &Message {
        self.next_id += 1;
        self.messages.push(Message {
            id: self.next_id,
            role,
            content: content.into(),
            is_error,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Drop every message. Only a new Summarize does this.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Role/content pairs for a completion request
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        self.messages
            .iter()
            .map(|m| LlmMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}
