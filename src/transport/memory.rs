//! In-process transport: each listener is an mpsc inbox

use super::{ContextRef, HostTransport, ListenerInstaller, TransportError};
use crate::command::Command;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

const INBOX_CAPACITY: usize = 32;

#[derive(Default)]
struct Listeners {
    inboxes: HashMap<ContextRef, mpsc::Sender<Command>>,
    privileged: HashSet<ContextRef>,
}

impl Listeners {
    /// Live inbox for `target`; a dropped one is forgotten
    fn live(&mut self, target: &ContextRef) -> Option<mpsc::Sender<Command>> {
        match self.inboxes.get(target) {
            Some(tx) if !tx.is_closed() => Some(tx.clone()),
            Some(_) => {
                self.inboxes.remove(target);
                None
            }
            None => None,
        }
    }
}

/// Transport whose contexts live in this process.
///
/// The listener table is keyed by context, which makes registration a
/// per-context singleton: at most one live inbox per context.
#[derive(Clone)]
pub struct MemoryTransport {
    listeners: Arc<Mutex<Listeners>>,
    installer: Option<Arc<dyn ListenerInstaller>>,
}

impl MemoryTransport {
    /// Transport that cannot inject listeners
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners::default())),
            installer: None,
        }
    }

    /// Transport that hands injected inboxes to `installer`
    pub fn with_installer(installer: Arc<dyn ListenerInstaller>) -> Self {
        Self {
            installer: Some(installer),
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener for `target`.
    ///
    /// Returns `None` when a live listener already exists, so a context never
    /// ends up with two.
    pub fn on_message(&self, target: &ContextRef) -> Option<mpsc::Receiver<Command>> {
        let mut listeners = self.lock();
        if listeners.live(target).is_some() {
            return None;
        }
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        listeners.inboxes.insert(target.clone(), tx);
        Some(rx)
    }

    /// Refuse injection into `target` from now on
    pub fn mark_privileged(&self, target: ContextRef) {
        self.lock().privileged.insert(target);
    }

    pub fn has_listener(&self, target: &ContextRef) -> bool {
        self.lock().live(target).is_some()
    }

    /// Forget the listener of `target`, as a page reload would
    pub fn drop_listener(&self, target: &ContextRef) {
        self.lock().inboxes.remove(target);
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostTransport for MemoryTransport {
    async fn send(&self, target: &ContextRef, command: Command) -> Result<(), TransportError> {
        let Some(tx) = self.lock().live(target) else {
            return Err(TransportError::NoReceiver(target.clone()));
        };
        tx.send(command)
            .await
            .map_err(|_| TransportError::NoReceiver(target.clone()))
    }

    async fn inject_listener(&self, target: &ContextRef) -> Result<(), TransportError> {
        if !target.accepts_injection() || self.lock().privileged.contains(target) {
            return Err(TransportError::InjectionDisallowed(target.clone()));
        }

        let Some(installer) = self.installer.as_ref() else {
            return Err(TransportError::InjectionFailed {
                context: target.clone(),
                reason: "no listener installer configured".to_string(),
            });
        };

        let Some(inbox) = self.on_message(target) else {
            tracing::debug!(target = %target, "Listener already present, injection skipped");
            return Ok(());
        };

        if let Err(e) = installer.install(target, inbox).await {
            // The inbox went to the failed installer; do not leave it registered
            self.drop_listener(target);
            return Err(e);
        }

        tracing::info!(target = %target, "Listener injected");
        Ok(())
    }
}
