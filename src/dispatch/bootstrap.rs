//! Context bootstrapper

use crate::transport::{ContextRef, HostTransport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// Makes sure a context has a listener before a command is delivered.
///
/// Must be idempotent: calling it for a context that already listens neither
/// fails nor creates a second session there.
#[async_trait]
pub trait Bootstrapper: Send + Sync {
    async fn ensure_listener(&self, target: &ContextRef) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Bootstrapper + ?Sized> Bootstrapper for Arc<T> {
    async fn ensure_listener(&self, target: &ContextRef) -> Result<(), TransportError> {
        (**self).ensure_listener(target).await
    }
}

/// Bootstrapper that injects through the transport, which owns the listener
/// singleton
pub struct TransportBootstrapper<T: HostTransport> {
    transport: T,
}

impl<T: HostTransport> TransportBootstrapper<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: HostTransport> Bootstrapper for TransportBootstrapper<T> {
    async fn ensure_listener(&self, target: &ContextRef) -> Result<(), TransportError> {
        self.transport.inject_listener(target).await
    }
}
