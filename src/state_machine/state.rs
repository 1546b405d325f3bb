//! Session state types

use super::effect::Effect;
use super::transcript::Transcript;
use crate::config::Configuration;
use serde::{Deserialize, Serialize};

/// Session state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing has happened yet
    #[default]
    Idle,

    /// One completion exchange in flight; further commands wait
    AwaitingCompletion,

    /// Last exchange produced a reply
    Ready,

    /// Last exchange failed. Fatal to that exchange only.
    Failed,
}

impl SessionState {
    /// Whether a completion exchange is outstanding
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::AwaitingCompletion)
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingCompletion => "awaiting_completion",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        }
    }
}

/// Data a session owns besides its state: the transcript and the cached
/// configuration shadow
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub config: Configuration,
    pub transcript: Transcript,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, config: Configuration) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            transcript: Transcript::new(),
        }
    }

    /// Apply an effect that only touches session-local data.
    ///
    /// Returns `false` for effects the runtime has to carry out itself.
    pub fn apply_local(&mut self, effect: &Effect) -> bool {
        match effect {
            Effect::ResetTranscript => {
                self.transcript.clear();
                true
            }
            Effect::AppendMessage {
                role,
                content,
                is_error,
            } => {
                self.transcript.append(*role, content.clone(), *is_error);
                true
            }
            Effect::UpdateConfig { config } => {
                self.config = config.clone();
                true
            }
            Effect::RequestCompletion { .. } => false,
        }
    }
}
