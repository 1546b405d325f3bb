//! Trait abstractions for runtime I/O
//!
//! The completion collaborator lives in `crate::llm`; the page surface is the
//! only other thing a session needs from its host context.

use crate::command::PageReference;
use std::sync::{Arc, Mutex, PoisonError};

/// The page a session is embedded in
pub trait PageSurface: Send + Sync {
    /// Current text selection, if any
    fn selection(&self) -> Option<String>;

    /// URL of the page
    fn page(&self) -> PageReference;
}

impl<T: PageSurface + ?Sized> PageSurface for Arc<T> {
    fn selection(&self) -> Option<String> {
        (**self).selection()
    }

    fn page(&self) -> PageReference {
        (**self).page()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Page surface whose selection is set by the host as the user selects text
pub struct StaticPage {
    page: PageReference,
    selection: Mutex<Option<String>>,
}

impl StaticPage {
    pub fn new(page: PageReference) -> Self {
        Self {
            page,
            selection: Mutex::new(None),
        }
    }

    pub fn with_selection(self, text: impl Into<String>) -> Self {
        self.select(Some(text.into()));
        self
    }

    pub fn select(&self, text: Option<String>) {
        *self.selection.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }
}

impl PageSurface for StaticPage {
    fn selection(&self) -> Option<String> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn page(&self) -> PageReference {
        self.page.clone()
    }
}
