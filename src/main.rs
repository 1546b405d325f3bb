//! AI summarizer command line
//!
//! Wires a controller, one page context and the session runtime together:
//! summarizes the text given as arguments (or the page at `--url`), then
//! answers follow-up questions read from stdin. A `/model NAME` line switches
//! the model for the rest of the session.

use ai_summarizer::command::{PageReference, Trigger};
use ai_summarizer::config::{ConfigStore, ConfigUpdate, SqliteConfigStore};
use ai_summarizer::controller::Controller;
use ai_summarizer::dispatch::{DeliveryResult, Dispatcher};
use ai_summarizer::llm::{LlmConfig, LoggingClient, MessageRole, Model, OpenAiClient};
use ai_summarizer::runtime::{SessionFactory, SessionUpdate, StaticPage};
use ai_summarizer::state_machine::SessionState;
use ai_summarizer::transport::{ContextRef, MemoryTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PAGE_URL: &str = "about:blank";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_summarizer=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let (url, selection) = parse_args(std::env::args().skip(1));

    // Configuration
    let db_path = std::env::var("SUMMARIZER_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.ai-summarizer/settings.db")
    });
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening settings database");
    let store = Arc::new(SqliteConfigStore::open(&db_path)?);

    let llm_config = LlmConfig::from_env();
    seed_from_env(store.as_ref(), &llm_config).await?;

    let client = OpenAiClient::new(llm_config.base_url.as_deref())?;
    tracing::info!(endpoint = %client.endpoint(), "Completion client initialized");
    let client = Arc::new(LoggingClient::new(Arc::new(client)));

    // Page context and its session factory
    let tab = ContextRef::page(1);
    let page_ref = PageReference::new(url.unwrap_or_else(|| DEFAULT_PAGE_URL.to_string()));
    let mut page = StaticPage::new(page_ref.clone());
    if let Some(text) = &selection {
        page = page.with_selection(text.clone());
    }

    let factory = Arc::new(SessionFactory::new(client, store.clone()));
    factory.register_page(tab.clone(), Arc::new(page));
    let mut updates = factory.subscribe();

    let transport = MemoryTransport::with_installer(factory.clone());
    let controller = Controller::new(Dispatcher::over(transport), store.clone());

    let trigger = match selection {
        Some(text) => Trigger::SelectionMenu {
            selection: Some(text),
        },
        None => Trigger::PopupAction,
    };

    let mut result = controller.dispatch_trigger(&tab, &page_ref, trigger).await;
    let mut awaiting_reply = true;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if let DeliveryResult::Abandoned { error, .. } = &result {
            eprintln!("{}", error.user_text());
            break;
        }
        if awaiting_reply && !print_until_settled(&mut updates).await {
            break;
        }

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }

        let trigger = match line.trim().strip_prefix("/model") {
            Some(name) => match name.trim().parse::<Model>() {
                Ok(model) => Trigger::WidgetModelPick { model },
                Err(e) => {
                    eprintln!("{e}");
                    awaiting_reply = false;
                    continue;
                }
            },
            None => Trigger::WidgetSubmit { text: line },
        };
        awaiting_reply = matches!(trigger, Trigger::WidgetSubmit { .. });
        result = controller.dispatch_trigger(&tab, &page_ref, trigger).await;
    }

    factory.shutdown();
    Ok(())
}

/// `[--url URL] [TEXT...]`; remaining words form the selection
fn parse_args(args: impl Iterator<Item = String>) -> (Option<String>, Option<String>) {
    let mut url = None;
    let mut words = Vec::new();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        if arg == "--url" {
            url = args.next();
        } else {
            words.push(arg);
        }
    }
    let text = words.join(" ");
    let selection = (!text.trim().is_empty()).then_some(text);
    (url, selection)
}

/// Environment values fill settings the store does not have yet
async fn seed_from_env(
    store: &dyn ConfigStore,
    llm_config: &LlmConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let current = store.load().await?;
    let mut update = ConfigUpdate::default();

    if !current.api_key_present() {
        if let Some(key) = &llm_config.openai_api_key {
            update = update.api_key(key.clone());
        }
    }
    if let Some(name) = &llm_config.default_model {
        match name.parse::<Model>() {
            Ok(model) => update = update.model(model),
            Err(e) => tracing::warn!(error = %e, "Ignoring SUMMARIZER_MODEL"),
        }
    }

    if update != ConfigUpdate::default() {
        store.set(update).await?;
    }
    if !store.load().await?.api_key_present() {
        tracing::warn!("No OpenAI API key configured. Set OPENAI_API_KEY.");
    }
    Ok(())
}

/// Print assistant messages until the session settles. Returns `false` when
/// the session is gone.
async fn print_until_settled(updates: &mut broadcast::Receiver<SessionUpdate>) -> bool {
    loop {
        match updates.recv().await {
            Ok(SessionUpdate::MessageAppended { message }) if message.role == MessageRole::Assistant => {
                println!("{}\n", message.content);
            }
            Ok(SessionUpdate::StateChanged {
                state: SessionState::Ready | SessionState::Failed,
            }) => return true,
            Ok(SessionUpdate::ModelChanged { model }) => eprintln!("Model: {model}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed session updates");
            }
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}
