//! Pure state transition function

use super::{Effect, Event, SessionContext, SessionState};
use crate::command::SummarizeSource;
use crate::error::SummarizerError;
use crate::llm::{CompletionRequest, LlmMessage};
use crate::state_machine::NO_SUMMARY_PLACEHOLDER;
use thiserror::Error;

/// System turn prepended to every request
pub const SYSTEM_DIRECTIVE: &str = "You are a helpful assistant.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// A completion is outstanding; the command must wait for it to settle
    #[error("A completion is in flight; command must wait")]
    ExchangeInFlight,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs and performs no
/// I/O. The request for a command is built from `context.config` as it is at
/// this moment; later configuration changes never touch it.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Blank chat input is ignored in every state, including while busy
        (_, Event::Chat { text }) if text.trim().is_empty() => Ok(TransitionResult::new(*state)),

        // ============================================================
        // Configuration (never blocked, never touches an exchange)
        // ============================================================
        (_, Event::ConfigChanged { config }) => {
            Ok(TransitionResult::new(*state).with_effect(Effect::UpdateConfig { config }))
        }

        (_, Event::ModelChanged { model }) => {
            let mut config = context.config.clone();
            config.model = model;
            Ok(TransitionResult::new(*state).with_effect(Effect::UpdateConfig { config }))
        }

        // ============================================================
        // Serialization: one exchange at a time
        // ============================================================
        (SessionState::AwaitingCompletion, event) if event.is_command() => {
            Err(TransitionError::ExchangeInFlight)
        }

        // ============================================================
        // Commands
        // ============================================================
        (_, Event::Summarize { source }) => Ok(summarize(context, &source)),

        (_, Event::Chat { text }) => Ok(chat(context, text.trim())),

        (_, Event::ShowError { error }) => {
            Ok(TransitionResult::new(SessionState::Failed).with_effect(Effect::append_error(&error)))
        }

        // ============================================================
        // Completion settlement
        // ============================================================
        (SessionState::AwaitingCompletion, Event::CompletionSuccess { text }) => {
            let trimmed = text.trim();
            let content = if trimmed.is_empty() {
                NO_SUMMARY_PLACEHOLDER
            } else {
                trimmed
            };
            Ok(TransitionResult::new(SessionState::Ready)
                .with_effect(Effect::append_assistant(content)))
        }

        (SessionState::AwaitingCompletion, Event::CompletionFailure { error }) => {
            Ok(TransitionResult::new(SessionState::Failed).with_effect(Effect::append_error(&error)))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn summarize(context: &SessionContext, source: &SummarizeSource) -> TransitionResult {
    let reset = TransitionResult::new(SessionState::AwaitingCompletion)
        .with_effect(Effect::ResetTranscript);

    match context.config.api_key.as_deref().filter(|_| context.config.api_key_present()) {
        Some(api_key) => {
            let request = CompletionRequest::new(
                context.config.model,
                SYSTEM_DIRECTIVE,
                vec![LlmMessage::user(source.prompt())],
                api_key,
            );
            reset.with_effect(Effect::RequestCompletion { request })
        }
        None => TransitionResult {
            new_state: SessionState::Failed,
            ..reset
        }
        .with_effect(Effect::append_error(&SummarizerError::MissingApiKey)),
    }
}

fn chat(context: &SessionContext, text: &str) -> TransitionResult {
    let append = Effect::append_user(text);

    match context.config.api_key.as_deref().filter(|_| context.config.api_key_present()) {
        Some(api_key) => {
            let mut messages = context.transcript.to_llm_messages();
            messages.push(LlmMessage::user(text));
            let request =
                CompletionRequest::new(context.config.model, SYSTEM_DIRECTIVE, messages, api_key);
            TransitionResult::new(SessionState::AwaitingCompletion)
                .with_effects([append, Effect::RequestCompletion { request }])
        }
        None => TransitionResult::new(SessionState::Failed)
            .with_effects([append, Effect::append_error(&SummarizerError::MissingApiKey)]),
    }
}
