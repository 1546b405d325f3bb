//! Commands exchanged between contexts
//!
//! The host transport carries string-discriminated messages; here they are a
//! tagged union. A `Command` is immutable and consumed exactly once by the
//! receiving session.

use crate::error::SummarizerError;
use crate::llm::Model;
use serde::{Deserialize, Serialize};

/// Prefix for summarizing a selection
pub const SELECTION_SUMMARY_PROMPT: &str = "Summarize the following text. Include all the information that the user needs to know about the text, and do not miss anything important.\n\n";

/// Prefix for summarizing a whole page
pub const PAGE_SUMMARY_PROMPT: &str = "Summarize the following web page. Include all the information that the user needs to know about the page, and do not miss anything important.\n\n";

/// A page as the controller sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub url: String,
}

impl PageReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// What a Summarize command covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarizeSource {
    Selection { text: String },
    Page { page: PageReference },
}

impl SummarizeSource {
    pub fn selection(text: impl Into<String>) -> Self {
        Self::Selection { text: text.into() }
    }

    pub fn page(page: PageReference) -> Self {
        Self::Page { page }
    }

    /// User turn sent to the model. Pages are referenced by URL, not content.
    pub fn prompt(&self) -> String {
        match self {
            SummarizeSource::Selection { text } => format!("{SELECTION_SUMMARY_PROMPT}{text}"),
            SummarizeSource::Page { page } => format!("{PAGE_SUMMARY_PROMPT}{}", page.url),
        }
    }
}

/// Message delivered to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start a fresh summary, replacing the transcript
    Summarize { source: SummarizeSource },
    /// Continue the conversation with user text
    Chat { text: String },
    /// Global shortcut; resolved against the page's own selection
    ShortcutTrigger { page: PageReference },
    /// Show an error produced outside the session
    Error { error: SummarizerError },
    /// Model picked in the widget. Applies to this session only.
    SelectModel { model: Model },
}

impl Command {
    pub fn summarize(source: SummarizeSource) -> Self {
        Command::Summarize { source }
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Command::Chat { text: text.into() }
    }

    pub fn error(error: SummarizerError) -> Self {
        Command::Error { error }
    }

    pub fn select_model(model: Model) -> Self {
        Command::SelectModel { model }
    }

    /// Discriminator, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Summarize { .. } => "summarize",
            Command::Chat { .. } => "chat",
            Command::ShortcutTrigger { .. } => "shortcut_trigger",
            Command::Error { .. } => "error",
            Command::SelectModel { .. } => "select_model",
        }
    }
}

/// Resolve a shortcut inside the page: a non-empty selection wins, otherwise
/// the whole page is summarized.
pub fn resolve_shortcut(selection: Option<&str>, page: PageReference) -> Command {
    match selection.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Command::summarize(SummarizeSource::selection(text)),
        None => Command::summarize(SummarizeSource::page(page)),
    }
}

/// User actions that produce commands. Registration lives with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Context-menu entry on a text selection
    SelectionMenu { selection: Option<String> },
    /// Global keyboard shortcut
    Shortcut,
    /// "Summarize this page" in the popup
    PopupAction,
    /// Text submitted in the page widget
    WidgetSubmit { text: String },
    /// Model picked in the page widget
    WidgetModelPick { model: Model },
}

impl Trigger {
    /// Map a trigger to the command sent to the page showing `page`
    pub fn into_command(self, page: &PageReference) -> Command {
        match self {
            Trigger::SelectionMenu { selection } => {
                match selection.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(text) => Command::summarize(SummarizeSource::selection(text)),
                    None => Command::error(SummarizerError::NoTextSelected),
                }
            }
            Trigger::Shortcut => Command::ShortcutTrigger { page: page.clone() },
            Trigger::PopupAction => Command::summarize(SummarizeSource::page(page.clone())),
            Trigger::WidgetSubmit { text } => Command::chat(text),
            Trigger::WidgetModelPick { model } => Command::select_model(model),
        }
    }
}
