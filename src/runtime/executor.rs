//! Session runtime executor

use super::traits::PageSurface;
use super::SessionUpdate;

use crate::command::{resolve_shortcut, Command};
use crate::config::{ConfigChange, Subscription};
use crate::llm::{CompletionClient, CompletionRequest, Model};
use crate::state_machine::{transition, Effect, Event, SessionContext, SessionState, TransitionError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Runs one conversation session inside its context.
///
/// Commands arrive on `inbox`; completions run as background tasks and report
/// back on the internal event channel. Commands that arrive while an exchange
/// is in flight wait in `pending` and are replayed in arrival order once it
/// settles, each under the model that was current when it arrived.
pub struct SessionRuntime<C, P>
where
    C: CompletionClient + 'static,
    P: PageSurface + 'static,
{
    context: SessionContext,
    state: SessionState,
    client: Arc<C>,
    page: P,
    inbox: mpsc::Receiver<Command>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    config_changes: Option<Subscription>,
    cancel: CancellationToken,
    pending: VecDeque<(Event, Model)>,
}

impl<C, P> SessionRuntime<C, P>
where
    C: CompletionClient + 'static,
    P: PageSurface + 'static,
{
    pub fn new(
        context: SessionContext,
        client: C,
        page: P,
        inbox: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<SessionUpdate>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        Self {
            context,
            state: SessionState::Idle,
            client: Arc::new(client),
            page,
            inbox,
            event_rx,
            event_tx,
            broadcast_tx,
            config_changes: None,
            cancel: CancellationToken::new(),
            pending: VecDeque::new(),
        }
    }

    /// Refresh the configuration shadow from this subscription
    pub fn with_config_changes(mut self, subscription: Subscription) -> Self {
        self.config_changes = Some(subscription);
        self
    }

    /// Stop the loop when `token` is cancelled
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");
        let mut inbox_open = true;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event);
                }
                command = self.inbox.recv(), if inbox_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!(session_id = %self.context.session_id, "Inbox closed");
                        inbox_open = false;
                    }
                },
                change = next_change(&mut self.config_changes) => match change {
                    Some(change) => self.process_event(Event::ConfigChanged { config: change.config }),
                    None => self.config_changes = None,
                },
            }

            // A closed inbox ends the session once nothing is left to settle
            if !inbox_open && !self.state.is_busy() && self.pending.is_empty() {
                break;
            }
        }

        tracing::info!(
            session_id = %self.context.session_id,
            state = self.state.name(),
            messages = self.context.transcript.len(),
            "Session runtime stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(
            session_id = %self.context.session_id,
            kind = command.kind(),
            "Command received"
        );

        let command = match command {
            Command::ShortcutTrigger { page } => {
                resolve_shortcut(self.page.selection().as_deref(), page)
            }
            other => other,
        };

        if let Some(event) = Event::from_command(command) {
            self.process_event(event);
        }
    }

    /// Apply one event, then replay queued commands for as long as the
    /// session stays free.
    fn process_event(&mut self, event: Event) {
        self.apply(event);

        while !self.state.is_busy() {
            let Some((event, model)) = self.pending.pop_front() else {
                break;
            };
            tracing::debug!(
                session_id = %self.context.session_id,
                remaining = self.pending.len(),
                model = %model,
                "Replaying queued command"
            );
            self.replay(event, model);
        }
    }

    /// Apply a queued command under the model cached when it was accepted.
    /// Model changes that landed while it waited stay in effect afterwards.
    fn replay(&mut self, event: Event, model: Model) {
        let current = std::mem::replace(&mut self.context.config.model, model);
        self.apply(event);
        self.context.config.model = current;
    }

    fn apply(&mut self, event: Event) {
        let is_command = event.is_command();
        let result = match transition(&self.state, &self.context, event.clone()) {
            Ok(r) => r,
            Err(TransitionError::ExchangeInFlight) => {
                self.pending.push_back((event, self.context.config.model));
                tracing::debug!(
                    session_id = %self.context.session_id,
                    queued = self.pending.len(),
                    "Exchange in flight, command queued"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(session_id = %self.context.session_id, error = %e, "Event rejected");
                let _ = self.broadcast_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let old_state = std::mem::replace(&mut self.state, result.new_state);

        for effect in result.effects {
            self.execute_effect(effect);
        }

        if old_state != self.state {
            tracing::debug!(
                session_id = %self.context.session_id,
                from = old_state.name(),
                to = self.state.name(),
                "State changed"
            );
        }
        // Every handled command reports its resulting state, even an unchanged one
        if old_state != self.state || is_command {
            let _ = self
                .broadcast_tx
                .send(SessionUpdate::StateChanged { state: self.state });
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        if let Effect::RequestCompletion { request } = effect {
            self.spawn_completion(request);
            return;
        }

        let previous_model = self.context.config.model;
        self.context.apply_local(&effect);

        match effect {
            Effect::ResetTranscript => {
                let _ = self.broadcast_tx.send(SessionUpdate::TranscriptReset);
            }
            Effect::AppendMessage { .. } => {
                if let Some(message) = self.context.transcript.last() {
                    let _ = self.broadcast_tx.send(SessionUpdate::MessageAppended {
                        message: message.clone(),
                    });
                }
            }
            Effect::UpdateConfig { config } => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    model = %config.model,
                    api_key_present = config.api_key_present(),
                    "Configuration shadow refreshed"
                );
                if config.model != previous_model {
                    let _ = self
                        .broadcast_tx
                        .send(SessionUpdate::ModelChanged { model: config.model });
                }
            }
            Effect::RequestCompletion { .. } => {}
        }
    }

    fn spawn_completion(&self, request: CompletionRequest) {
        let client = Arc::clone(&self.client);
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(
                session_id = %session_id,
                model = %request.model,
                turns = request.messages.len(),
                "Requesting completion (background)"
            );

            let event = match client.complete(&request).await {
                Ok(response) => Event::CompletionSuccess {
                    text: response.text,
                },
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, kind = ?e.kind, "Completion failed");
                    Event::CompletionFailure { error: e.into() }
                }
            };

            if event_tx.send(event).await.is_err() {
                tracing::debug!(session_id = %session_id, "Session gone before completion settled");
            }
        });
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ConfigChange> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
