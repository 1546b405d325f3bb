//! Controller and popup: turn user triggers into dispatched commands

use crate::command::{PageReference, Trigger};
use crate::config::{ConfigError, ConfigStore, ConfigUpdate, Configuration};
use crate::dispatch::{Bootstrapper, DeliveryResult, Dispatcher};
use crate::error::SummarizerError;
use crate::llm::Model;
use crate::transport::{ContextRef, HostTransport};
use std::sync::Arc;
use thiserror::Error;

/// Long-lived context that owns trigger handling
pub struct Controller<T: HostTransport, B: Bootstrapper> {
    dispatcher: Dispatcher<T, B>,
    store: Arc<dyn ConfigStore>,
}

impl<T: HostTransport, B: Bootstrapper> Controller<T, B> {
    pub fn new(dispatcher: Dispatcher<T, B>, store: Arc<dyn ConfigStore>) -> Self {
        Self { dispatcher, store }
    }

    /// Handle a trigger fired on the page shown in `tab`.
    ///
    /// Returns `None` when the trigger is ignored (shortcut disabled).
    pub async fn on_trigger(
        &self,
        tab: &ContextRef,
        page: &PageReference,
        trigger: Trigger,
    ) -> Result<Option<DeliveryResult>, ConfigError> {
        if trigger == Trigger::Shortcut && !self.store.load().await?.shortcut_enabled {
            tracing::debug!(target = %tab, "Shortcut disabled, trigger ignored");
            return Ok(None);
        }

        Ok(Some(self.dispatch_trigger(tab, page, trigger).await))
    }

    /// Dispatch a trigger's command without any gating
    pub async fn dispatch_trigger(
        &self,
        tab: &ContextRef,
        page: &PageReference,
        trigger: Trigger,
    ) -> DeliveryResult {
        let command = trigger.into_command(page);
        let result = self.dispatcher.dispatch(tab, command).await;
        if let DeliveryResult::Abandoned { error, .. } = &result {
            tracing::warn!(target = %tab, error = %error, "Trigger could not reach the page");
        }
        result
    }
}

#[derive(Debug, Error)]
pub enum PopupError {
    #[error(transparent)]
    Rejected(#[from] SummarizerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Transient popup: settings form plus "summarize this page"
pub struct Popup<T: HostTransport, B: Bootstrapper> {
    controller: Arc<Controller<T, B>>,
    store: Arc<dyn ConfigStore>,
}

impl<T: HostTransport, B: Bootstrapper> Popup<T, B> {
    pub fn new(controller: Arc<Controller<T, B>>, store: Arc<dyn ConfigStore>) -> Self {
        Self { controller, store }
    }

    /// Values to pre-fill the form with
    pub async fn open(&self) -> Result<Configuration, ConfigError> {
        self.store.load().await
    }

    /// Persist the entered key and model, then summarize the active page
    pub async fn summarize_page(
        &self,
        tab: &ContextRef,
        page: &PageReference,
        api_key: &str,
        model: Model,
    ) -> Result<DeliveryResult, PopupError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SummarizerError::MissingApiKey.into());
        }

        self.store
            .set(ConfigUpdate::default().api_key(api_key).model(model))
            .await?;

        Ok(self
            .controller
            .dispatch_trigger(tab, page, Trigger::PopupAction)
            .await)
    }
}
