//! Conversation session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime owns the I/O; this module only decides.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;
pub mod transcript;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{SessionContext, SessionState};
pub use transcript::{Message, Transcript, NO_SUMMARY_PLACEHOLDER};
pub use transition::{transition, TransitionError, TransitionResult, SYSTEM_DIRECTIVE};
