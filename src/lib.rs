//! AI summarizer coordination layer
//!
//! Delivers summarize/chat commands across independently-lived contexts
//! (controller, page widget, popup) with bootstrap-and-retry, and runs one
//! conversation session per page on top of a pure state machine.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod state_machine;
pub mod transport;
