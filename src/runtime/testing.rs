//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{SessionRuntime, SessionUpdate};
use crate::command::{Command, PageReference};
use crate::config::{ConfigStore, Configuration, MemoryConfigStore};
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse, LlmError, Model, Usage};
use crate::state_machine::{Message, SessionContext, SessionState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

// ============================================================================
// Mock Completion Client
// ============================================================================

/// Mock completion client that returns queued responses
pub struct MockCompletionClient {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
    /// When set, each request waits for a `release` before answering
    gate: Option<Arc<Notify>>,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            request_started: Arc::new(Notify::new()),
        }
    }

    /// Hold every request until [`release`](Self::release) is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new()
        }
    }

    /// Let one held request answer
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Queue a successful reply
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletionResponse {
                text: text.into(),
                usage: Usage::default(),
            }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// A running session with its inbox and a local mirror of its transcript
pub struct TestSession {
    pub inbox: mpsc::Sender<Command>,
    pub broadcast_rx: broadcast::Receiver<SessionUpdate>,
    pub client: Arc<MockCompletionClient>,
    pub store: Arc<MemoryConfigStore>,
    pub page: Arc<StaticPage>,
    transcript: Vec<Message>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

pub struct TestSessionBuilder {
    config: Configuration,
    client: Option<MockCompletionClient>,
    page: StaticPage,
}

impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder {
            config: Configuration {
                api_key: Some("sk-test".to_string()),
                ..Configuration::default()
            },
            client: None,
            page: StaticPage::new(PageReference::new("https://example.com/article")),
        }
    }

    pub async fn send(&self, command: Command) {
        self.inbox
            .send(command)
            .await
            .expect("Failed to send command");
    }

    /// Wait until the session reports `expected`, mirroring the transcript
    /// along the way
    pub async fn wait_for_state(&mut self, expected: SessionState, timeout: Duration) -> bool {
        self.wait_for(
            |update| matches!(update, SessionUpdate::StateChanged { state } if *state == expected),
            timeout,
        )
        .await
    }

    /// Wait until the session switches to `expected`
    pub async fn wait_for_model(&mut self, expected: Model, timeout: Duration) -> bool {
        self.wait_for(
            |update| matches!(update, SessionUpdate::ModelChanged { model } if *model == expected),
            timeout,
        )
        .await
    }

    /// Wait until the session has handled every command sent so far.
    /// Blank chat changes nothing but still reports the current state.
    pub async fn sync(&mut self, timeout: Duration) -> bool {
        self.send(Command::chat("")).await;
        self.wait_for(
            |update| matches!(update, SessionUpdate::StateChanged { .. }),
            timeout,
        )
        .await
    }

    async fn wait_for(
        &mut self,
        matches: impl Fn(&SessionUpdate) -> bool,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(update)) => {
                    let found = matches(&update);
                    self.mirror(update);
                    if found {
                        return true;
                    }
                }
                _ => continue,
            }
        }
        false
    }

    /// Drain updates already broadcast into the mirror
    pub fn drain(&mut self) {
        while let Ok(update) = self.broadcast_rx.try_recv() {
            self.mirror(update);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    fn mirror(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::TranscriptReset => self.transcript.clear(),
            SessionUpdate::MessageAppended { message } => self.transcript.push(message),
            SessionUpdate::StateChanged { .. }
            | SessionUpdate::ModelChanged { .. }
            | SessionUpdate::Error { .. } => {}
        }
    }
}

impl TestSessionBuilder {
    pub fn without_api_key(mut self) -> Self {
        self.config.api_key = None;
        self
    }

    pub fn client(mut self, client: MockCompletionClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn selection(mut self, text: impl Into<String>) -> Self {
        self.page = self.page.with_selection(text);
        self
    }

    pub fn build(self) -> TestSession {
        let client = Arc::new(self.client.unwrap_or_default());
        let store = Arc::new(MemoryConfigStore::with_config(&self.config));
        let page = Arc::new(self.page);

        let (inbox, inbox_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = SessionRuntime::new(
            SessionContext::new("test-session", self.config),
            client.clone(),
            page.clone(),
            inbox_rx,
            broadcast_tx,
        )
        .with_config_changes(store.subscribe());

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestSession {
            inbox,
            broadcast_rx,
            client,
            store,
            page,
            transcript: Vec::new(),
            _runtime_handle: handle,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SummarizeSource;
    use crate::config::ConfigUpdate;
    use crate::error::SummarizerError;
    use crate::llm::MessageRole;
    use crate::state_machine::NO_SUMMARY_PLACEHOLDER;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_mock_completion_client() {
        let client = MockCompletionClient::new();
        client.queue_text("hello");
        let request = CompletionRequest::new(Model::Gpt4oMini, "sys", vec![], "sk");

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(client.recorded_requests().len(), 1);

        // Nothing queued: network error
        assert!(client.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_summarize_selection_produces_one_assistant_message() {
        let client = MockCompletionClient::new();
        client.queue_text("  A short summary.  \n");

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("Long text")))
            .await;

        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);
        let msgs = session.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, MessageRole::Assistant);
        assert_eq!(msgs[0].content, "A short summary.");
        assert!(!msgs[0].is_error);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_placeholder() {
        let client = MockCompletionClient::new();
        client.queue_text("");

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("text")))
            .await;

        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);
        assert_eq!(session.messages()[0].content, NO_SUMMARY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let mut session = TestSession::builder().without_api_key().build();
        session
            .send(Command::summarize(SummarizeSource::selection("some text")))
            .await;

        assert!(session.wait_for_state(SessionState::Failed, WAIT).await);
        let msgs = session.messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].is_error);
        assert_eq!(msgs[0].content, SummarizerError::MissingApiKey.user_text());
        assert!(session.client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_then_chat_recovers() {
        let client = MockCompletionClient::new();
        client.queue_error(LlmError::from_status(429, "Rate limit reached"));
        client.queue_text("Second try worked");

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("text")))
            .await;

        assert!(session.wait_for_state(SessionState::Failed, WAIT).await);
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].content.starts_with("Error: "));
        assert!(session.messages()[0].is_error);

        session.send(Command::chat("try again")).await;
        assert!(
            session
                .wait_for_state(SessionState::AwaitingCompletion, WAIT)
                .await
        );
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let msgs = session.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, MessageRole::User);
        assert_eq!(msgs[2].content, "Second try worked");
    }

    #[tokio::test]
    async fn test_external_model_change_applies_to_next_chat() {
        let client = MockCompletionClient::new();
        client.queue_text("ok");

        let mut session = TestSession::builder().client(client).build();
        session
            .store
            .set(ConfigUpdate::default().model(Model::Gpt4))
            .await
            .unwrap();

        assert!(session.wait_for_model(Model::Gpt4, WAIT).await);
        session.send(Command::chat("hello")).await;
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let requests = session.client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, Model::Gpt4);
        assert_eq!(requests[0].model.api_name(), "gpt-4");
    }

    #[tokio::test]
    async fn test_commands_while_awaiting_are_queued_in_order() {
        let client = MockCompletionClient::gated();
        client.queue_text("summary");
        client.queue_text("first answer");
        client.queue_text("second answer");
        let started = client.request_started.clone();

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("text")))
            .await;
        tokio::time::timeout(WAIT, started.notified())
            .await
            .expect("first request should start");

        // Both arrive while the summary is in flight
        session.send(Command::chat("first")).await;
        session.send(Command::chat("second")).await;
        assert!(session.sync(WAIT).await);
        assert_eq!(session.client.recorded_requests().len(), 1);

        for _ in 0..3 {
            session.client.release();
            assert!(session.wait_for_state(SessionState::Ready, WAIT).await);
        }

        let requests = session.client.recorded_requests();
        assert_eq!(requests.len(), 3);
        // Each chat request carries the whole settled transcript
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(requests[2].messages.len(), 4);

        let contents: Vec<&str> = session
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            contents,
            vec!["summary", "first", "first answer", "second", "second answer"]
        );
    }

    #[tokio::test]
    async fn test_queued_command_keeps_model_cached_on_arrival() {
        let client = MockCompletionClient::gated();
        client.queue_text("summary");
        client.queue_text("answer");
        client.queue_text("later answer");

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("text")))
            .await;
        assert!(
            session
                .wait_for_state(SessionState::AwaitingCompletion, WAIT)
                .await
        );

        session.send(Command::chat("follow up")).await;
        assert!(session.sync(WAIT).await);

        // Lands after the chat was accepted but before it runs
        session
            .store
            .set(ConfigUpdate::default().model(Model::Gpt4))
            .await
            .unwrap();
        assert!(session.wait_for_model(Model::Gpt4, WAIT).await);

        for _ in 0..2 {
            session.client.release();
            assert!(session.wait_for_state(SessionState::Ready, WAIT).await);
        }

        // The change still applies to commands that arrive afterwards
        session.send(Command::chat("again")).await;
        session.client.release();
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let models: Vec<Model> = session
            .client
            .recorded_requests()
            .iter()
            .map(|r| r.model)
            .collect();
        assert_eq!(models, vec![Model::Gpt4oMini, Model::Gpt4oMini, Model::Gpt4]);
    }

    #[tokio::test]
    async fn test_widget_model_pick_applies_to_next_chat() {
        let client = MockCompletionClient::gated();
        client.queue_text("summary");
        client.queue_text("answer");

        let mut session = TestSession::builder().client(client).build();
        session
            .send(Command::summarize(SummarizeSource::selection("text")))
            .await;
        assert!(
            session
                .wait_for_state(SessionState::AwaitingCompletion, WAIT)
                .await
        );

        // Picked while the summary is in flight; never queued
        session.send(Command::select_model(Model::Gpt35Turbo)).await;
        assert!(session.wait_for_model(Model::Gpt35Turbo, WAIT).await);

        session.client.release();
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        session.send(Command::chat("and then?")).await;
        session.client.release();
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let requests = session.client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, Model::Gpt4oMini);
        assert_eq!(requests[1].model, Model::Gpt35Turbo);

        // Local to the session
        assert_eq!(session.store.load().await.unwrap().model, Model::Gpt4oMini);
    }

    #[tokio::test]
    async fn test_shortcut_prefers_selection() {
        let client = MockCompletionClient::new();
        client.queue_text("ok");

        let mut session = TestSession::builder()
            .client(client)
            .selection("highlighted words")
            .build();
        session
            .send(Command::ShortcutTrigger {
                page: PageReference::new("https://example.com/article"),
            })
            .await;
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let requests = session.client.recorded_requests();
        assert!(requests[0].messages[0]
            .content
            .ends_with("highlighted words"));
    }

    #[tokio::test]
    async fn test_shortcut_without_selection_summarizes_page() {
        let client = MockCompletionClient::new();
        client.queue_text("ok");

        let mut session = TestSession::builder().client(client).build();
        session.page.select(Some("   ".into()));
        session
            .send(Command::ShortcutTrigger {
                page: PageReference::new("https://example.com/article"),
            })
            .await;
        assert!(session.wait_for_state(SessionState::Ready, WAIT).await);

        let requests = session.client.recorded_requests();
        assert!(requests[0].messages[0]
            .content
            .contains("https://example.com/article"));
    }

    #[tokio::test]
    async fn test_error_command_shows_error() {
        let mut session = TestSession::builder().build();
        session
            .send(Command::error(SummarizerError::NoTextSelected))
            .await;

        assert!(session.wait_for_state(SessionState::Failed, WAIT).await);
        assert_eq!(
            session.messages()[0].content,
            "Error: No text selected to summarize."
        );
    }

    #[tokio::test]
    async fn test_blank_chat_changes_nothing() {
        let mut session = TestSession::builder().build();
        session.send(Command::chat("   ")).await;
        assert!(session.wait_for_state(SessionState::Idle, WAIT).await);

        session.drain();
        assert!(session.messages().is_empty());
        assert!(session.client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_bootstraps_one_session_per_page() {
        use crate::dispatch::{DeliveryResult, Dispatcher};
        use crate::runtime::SessionFactory;
        use crate::transport::{ContextRef, HostTransport, MemoryTransport};

        let client = Arc::new(MockCompletionClient::new());
        client.queue_text("page summary");
        client.queue_text("follow-up answer");
        let store = Arc::new(MemoryConfigStore::with_config(&Configuration {
            api_key: Some("sk-test".into()),
            ..Configuration::default()
        }));

        let factory = Arc::new(SessionFactory::new(client.clone(), store));
        let mut updates = factory.subscribe();
        let transport = MemoryTransport::with_installer(factory.clone());
        let dispatcher = Dispatcher::over(transport.clone());
        let tab = ContextRef::page(11);

        let first = dispatcher
            .dispatch(
                &tab,
                Command::summarize(SummarizeSource::page(PageReference::new(
                    "https://example.com",
                ))),
            )
            .await;
        assert_eq!(first, DeliveryResult::DeliveredAfterBootstrap);
        let session_id = factory.session_id(&tab).unwrap();

        // A redundant bootstrap must not replace the running session
        transport.inject_listener(&tab).await.unwrap();
        assert_eq!(factory.session_id(&tab), Some(session_id));

        let second = dispatcher.dispatch(&tab, Command::chat("more")).await;
        assert_eq!(second, DeliveryResult::Delivered);

        let mut ready = 0;
        while ready < 2 {
            match tokio::time::timeout(WAIT, updates.recv()).await {
                Ok(Ok(SessionUpdate::StateChanged {
                    state: SessionState::Ready,
                })) => ready += 1,
                Ok(Ok(_)) => {}
                other => panic!("session did not settle: {other:?}"),
            }
        }
        assert_eq!(client.recorded_requests().len(), 2);
        factory.shutdown();
    }
}
