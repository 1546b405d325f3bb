//! Runtime for conversation sessions
//!
//! Every page context that gets a listener runs one `SessionRuntime`. The
//! `SessionFactory` is what the transport calls when it injects a listener.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::command::{Command, PageReference};
use crate::config::ConfigStore;
use crate::llm::{CompletionClient, Model};
use crate::state_machine::{Message, SessionContext, SessionState};
use crate::transport::{ContextRef, ListenerInstaller, TransportError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Updates sent to whatever renders a session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    MessageAppended { message: Message },
    TranscriptReset,
    /// Sent on every state change and after every handled command
    StateChanged { state: SessionState },
    /// The model used for the next request changed
    ModelChanged { model: Model },
    Error { message: String },
}

/// Starts a session in each context the transport injects a listener into
pub struct SessionFactory {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ConfigStore>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    cancel: CancellationToken,
    pages: Mutex<HashMap<ContextRef, Arc<dyn PageSurface>>>,
    /// Session id per context, replaced when a reloaded context is re-injected
    sessions: Mutex<HashMap<ContextRef, String>>,
}

impl SessionFactory {
    pub fn new(client: Arc<dyn CompletionClient>, store: Arc<dyn ConfigStore>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(128);
        Self {
            client,
            store,
            broadcast_tx,
            cancel: CancellationToken::new(),
            pages: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Declare the page surface shown in `context`
    pub fn register_page(&self, context: ContextRef, page: Arc<dyn PageSurface>) {
        lock(&self.pages).insert(context, page);
    }

    /// Updates from every session this factory starts
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn session_id(&self, context: &ContextRef) -> Option<String> {
        lock(&self.sessions).get(context).cloned()
    }

    /// Stop every session started by this factory, without waiting for
    /// in-flight completions
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn page_for(&self, context: &ContextRef) -> Arc<dyn PageSurface> {
        lock(&self.pages).get(context).cloned().unwrap_or_else(|| {
            Arc::new(StaticPage::new(PageReference::new("about:blank"))) as Arc<dyn PageSurface>
        })
    }
}

#[async_trait]
impl ListenerInstaller for SessionFactory {
    async fn install(
        &self,
        target: &ContextRef,
        inbox: mpsc::Receiver<Command>,
    ) -> Result<(), TransportError> {
        // Subscribe before loading so no change between the two is missed
        let subscription = self.store.subscribe();
        let config = self
            .store
            .load()
            .await
            .map_err(|e| TransportError::InjectionFailed {
                context: target.clone(),
                reason: format!("failed to load configuration: {e}"),
            })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let runtime = SessionRuntime::new(
            SessionContext::new(&session_id, config),
            Arc::clone(&self.client),
            self.page_for(target),
            inbox,
            self.broadcast_tx.clone(),
        )
        .with_config_changes(subscription)
        .with_cancel(self.cancel.clone());

        tracing::info!(target = %target, session_id = %session_id, "Starting session");
        tokio::spawn(runtime.run());

        lock(&self.sessions).insert(target.clone(), session_id);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
