//! Configuration change fan-out
//!
//! Each subscriber owns an unbounded queue, so a slow session never loses a
//! change and observes them in commit order. Sessions never block on it.

use super::{ConfigChange, ConfigKey, Configuration};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

#[derive(Default)]
struct FanoutInner {
    next_subscriber: u64,
    seq: u64,
    subscribers: Vec<(u64, mpsc::UnboundedSender<ConfigChange>)>,
}

/// Distributes committed changes to every live subscriber
#[derive(Clone, Default)]
pub struct ConfigFanout {
    inner: Arc<Mutex<FanoutInner>>,
}

fn lock(inner: &Mutex<FanoutInner>) -> MutexGuard<'_, FanoutInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConfigFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a change to all subscribers. Callers serialize commits, so the
    /// returned sequence number orders them.
    pub fn publish(&self, changed: Vec<ConfigKey>, config: Configuration) -> u64 {
        let mut inner = lock(&self.inner);
        inner.seq += 1;
        let change = ConfigChange {
            seq: inner.seq,
            changed,
            config,
        };

        inner
            .subscribers
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());

        tracing::debug!(
            seq = change.seq,
            subscribers = inner.subscribers.len(),
            changed = ?change.changed,
            "Configuration change published"
        );
        change.seq
    }

    /// Register a subscriber that pulls changes
    #[must_use = "dropping the subscription unsubscribes"]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = lock(&self.inner);
            inner.next_subscriber += 1;
            let id = inner.next_subscriber;
            inner.subscribers.push((id, tx));
            id
        };

        Subscription {
            id,
            fanout: Arc::downgrade(&self.inner),
            rx: Some(rx),
        }
    }

    /// Register a callback run for each change on a background task.
    /// The returned handle unsubscribes when dropped or on `unsubscribe()`.
    #[must_use = "dropping the subscription unsubscribes"]
    pub fn subscribe_with<F>(&self, mut on_change: F) -> Subscription
    where
        F: FnMut(ConfigChange) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        if let Some(mut rx) = subscription.rx.take() {
            tokio::spawn(async move {
                while let Some(change) = rx.recv().await {
                    on_change(change);
                }
            });
        }
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// Handle for one subscriber
pub struct Subscription {
    id: u64,
    fanout: Weak<Mutex<FanoutInner>>,
    rx: Option<mpsc::UnboundedReceiver<ConfigChange>>,
}

impl Subscription {
    /// Next change, or `None` once unsubscribed or the store is gone
    pub async fn recv(&mut self) -> Option<ConfigChange> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<ConfigChange> {
        self.rx.as_mut().and_then(|rx| rx.try_recv().ok())
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    fn detach(&mut self) {
        if let Some(inner) = self.fanout.upgrade() {
            lock(&inner).subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
