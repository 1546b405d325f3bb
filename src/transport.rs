//! Host messaging transport
//!
//! Contexts only reach each other through fire-and-forget messages. A send
//! to a context without a listener fails with `NoReceiver`; the dispatcher
//! then asks for a listener to be injected and tries once more.

pub mod memory;

pub use memory::MemoryTransport;

use crate::command::Command;
use crate::error::SummarizerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Address of an execution context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextRef {
    /// Long-lived controller
    Controller,
    /// Transient popup
    Popup,
    /// A page tab hosting the widget
    Page { tab_id: u64 },
}

impl ContextRef {
    pub fn page(tab_id: u64) -> Self {
        ContextRef::Page { tab_id }
    }

    /// Only pages can have a listener injected
    pub fn accepts_injection(&self) -> bool {
        matches!(self, ContextRef::Page { .. })
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextRef::Controller => write!(f, "controller"),
            ContextRef::Popup => write!(f, "popup"),
            ContextRef::Page { tab_id } => write!(f, "page:{tab_id}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("No listener in {0}")]
    NoReceiver(ContextRef),

    #[error("Listener injection is not allowed in {0}")]
    InjectionDisallowed(ContextRef),

    #[error("Listener injection into {context} failed: {reason}")]
    InjectionFailed { context: ContextRef, reason: String },
}

impl From<TransportError> for SummarizerError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NoReceiver(_) => SummarizerError::NoReceiver,
            TransportError::InjectionDisallowed(_) | TransportError::InjectionFailed { .. } => {
                SummarizerError::InjectionFailed
            }
        }
    }
}

/// Message passing between contexts
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Deliver without waiting for the receiver to act on it
    async fn send(&self, target: &ContextRef, command: Command) -> Result<(), TransportError>;

    /// Install a listener in `target`. A live listener makes this a no-op.
    async fn inject_listener(&self, target: &ContextRef) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: HostTransport + ?Sized> HostTransport for Arc<T> {
    async fn send(&self, target: &ContextRef, command: Command) -> Result<(), TransportError> {
        (**self).send(target, command).await
    }

    async fn inject_listener(&self, target: &ContextRef) -> Result<(), TransportError> {
        (**self).inject_listener(target).await
    }
}

/// Starts whatever consumes a freshly injected listener's inbox
#[async_trait]
pub trait ListenerInstaller: Send + Sync {
    async fn install(
        &self,
        target: &ContextRef,
        inbox: mpsc::Receiver<Command>,
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: ListenerInstaller + ?Sized> ListenerInstaller for Arc<T> {
    async fn install(
        &self,
        target: &ContextRef,
        inbox: mpsc::Receiver<Command>,
    ) -> Result<(), TransportError> {
        (**self).install(target, inbox).await
    }
}
