//! Events that can occur in a session

use crate::command::{Command, SummarizeSource};
use crate::config::Configuration;
use crate::error::SummarizerError;
use crate::llm::Model;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Command events
    Summarize {
        source: SummarizeSource,
    },
    Chat {
        text: String,
    },
    ShowError {
        error: SummarizerError,
    },

    // Completion events
    CompletionSuccess {
        text: String,
    },
    CompletionFailure {
        error: SummarizerError,
    },

    // Configuration events
    ConfigChanged {
        config: Configuration,
    },
    ModelChanged {
        model: Model,
    },
}

impl Event {
    /// Convert a delivered command. `ShortcutTrigger` has to be resolved
    /// against the page selection first and yields `None`.
    pub fn from_command(command: Command) -> Option<Self> {
        match command {
            Command::Summarize { source } => Some(Event::Summarize { source }),
            Command::Chat { text } => Some(Event::Chat { text }),
            Command::Error { error } => Some(Event::ShowError { error }),
            Command::SelectModel { model } => Some(Event::ModelChanged { model }),
            Command::ShortcutTrigger { .. } => None,
        }
    }

    /// Events that come from a command, as opposed to the session's own
    /// completion or configuration plumbing
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Event::Summarize { .. } | Event::Chat { .. } | Event::ShowError { .. }
        )
    }
}
