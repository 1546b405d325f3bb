//! Command delivery with bootstrap-and-retry
//!
//! A send that finds no receiver triggers exactly one bootstrap and exactly
//! one more send. There is no loop: a second miss abandons the dispatch.

mod bootstrap;

pub use bootstrap::{Bootstrapper, TransportBootstrapper};

use crate::command::Command;
use crate::error::SummarizerError;
use crate::transport::{ContextRef, HostTransport, TransportError};

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// A listener was already there
    Delivered,
    /// Delivered on the retry after injecting a listener
    DeliveredAfterBootstrap,
    /// Not delivered. `notice` is the error command to show the user.
    Abandoned {
        error: SummarizerError,
        notice: Command,
    },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DeliveryResult::Abandoned { .. })
    }
}

pub struct Dispatcher<T: HostTransport, B: Bootstrapper> {
    transport: T,
    bootstrapper: B,
}

impl<T: HostTransport + Clone> Dispatcher<T, TransportBootstrapper<T>> {
    /// Dispatcher that bootstraps through the same transport it sends on
    pub fn over(transport: T) -> Self {
        Self::new(transport.clone(), TransportBootstrapper::new(transport))
    }
}

impl<T: HostTransport, B: Bootstrapper> Dispatcher<T, B> {
    pub fn new(transport: T, bootstrapper: B) -> Self {
        Self {
            transport,
            bootstrapper,
        }
    }

    pub async fn dispatch(&self, target: &ContextRef, command: Command) -> DeliveryResult {
        let kind = command.kind();

        match self.transport.send(target, command.clone()).await {
            Ok(()) => {
                tracing::debug!(target = %target, kind, "Command delivered");
                return DeliveryResult::Delivered;
            }
            Err(TransportError::NoReceiver(_)) => {
                tracing::info!(target = %target, kind, "No receiver, bootstrapping listener");
            }
            Err(e) => return abandon(target, kind, &e),
        }

        if let Err(e) = self.bootstrapper.ensure_listener(target).await {
            return abandon(target, kind, &e);
        }

        match self.transport.send(target, command).await {
            Ok(()) => {
                tracing::info!(target = %target, kind, "Command delivered after bootstrap");
                DeliveryResult::DeliveredAfterBootstrap
            }
            Err(e) => abandon(target, kind, &e),
        }
    }
}

fn abandon(target: &ContextRef, kind: &'static str, error: &TransportError) -> DeliveryResult {
    tracing::error!(target = %target, kind, error = %error, "Dispatch abandoned");
    let error = SummarizerError::from(error.clone());
    DeliveryResult::Abandoned {
        notice: Command::error(error.clone()),
        error,
    }
}
