//! Property-based tests for the session state machine
//!
//! These drive the pure transition function and apply its local effects the
//! way the runtime does, then check the invariants over arbitrary sequences.

use super::*;
use crate::command::{PageReference, SummarizeSource};
use crate::config::Configuration;
use crate::error::SummarizerError;
use crate::llm::{MessageRole, Model};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn keyed_context() -> SessionContext {
    SessionContext::new(
        "prop-session",
        Configuration {
            api_key: Some("sk-prop".to_string()),
            ..Configuration::default()
        },
    )
}

/// Apply one event; on success apply local effects and return the models of
/// the requests the runtime would have started.
fn step(
    state: &mut SessionState,
    ctx: &mut SessionContext,
    event: Event,
) -> Result<Vec<Model>, TransitionError> {
    let result = transition(state, ctx, event)?;
    *state = result.new_state;
    let mut requests = Vec::new();
    for effect in &result.effects {
        if !ctx.apply_local(effect) {
            if let Effect::RequestCompletion { request } = effect {
                requests.push(request.model);
            }
        }
    }
    Ok(requests)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_model() -> impl Strategy<Value = Model> {
    prop_oneof![
        Just(Model::Gpt4oMini),
        Just(Model::Gpt4),
        Just(Model::Gpt35Turbo),
    ]
}

fn arb_source() -> impl Strategy<Value = SummarizeSource> {
    prop_oneof![
        "[a-zA-Z ]{1,40}".prop_map(SummarizeSource::selection),
        "[a-z]{3,10}".prop_map(|host| {
            SummarizeSource::page(PageReference::new(format!("https://{host}.com")))
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_source().prop_map(|source| Event::Summarize { source }),
        "[a-zA-Z ]{0,20}".prop_map(|text| Event::Chat { text }),
        "[a-zA-Z ]{0,40}".prop_map(|text| Event::CompletionSuccess { text }),
        "[a-zA-Z ]{1,20}".prop_map(|m| Event::CompletionFailure {
            error: SummarizerError::completion(m)
        }),
        Just(Event::ShowError {
            error: SummarizerError::NoTextSelected
        }),
        arb_model().prop_map(|model| Event::ModelChanged { model }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant: message ids strictly increase across any append sequence
    #[test]
    fn prop_message_ids_strictly_increase(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = SessionState::Idle;
        let mut ctx = keyed_context();
        let mut last_id = 0u64;

        for event in events {
            let _ = step(&mut state, &mut ctx, event);
            for msg in ctx.transcript.messages() {
                prop_assert!(msg.id > 0);
            }
            let ids: Vec<u64> = ctx.transcript.messages().iter().map(|m| m.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            if let Some(last) = ctx.transcript.last() {
                prop_assert!(last.id >= last_id);
                last_id = last.id;
            }
        }
    }

    // Invariant: at most one outstanding exchange
    #[test]
    fn prop_single_outstanding_exchange(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = SessionState::Idle;
        let mut ctx = keyed_context();

        for event in events {
            let was_busy = state.is_busy();
            if let Ok(requests) = step(&mut state, &mut ctx, event) {
                prop_assert!(requests.len() <= 1);
                if was_busy {
                    prop_assert!(requests.is_empty(), "request started while one was in flight");
                }
                if !requests.is_empty() {
                    prop_assert_eq!(state, SessionState::AwaitingCompletion);
                }
            }
        }
    }

    // Chat("") and whitespace-only chat are no-ops
    #[test]
    fn prop_blank_chat_is_noop(
        prefix in proptest::collection::vec(arb_event(), 0..20),
        blank in "[ \t\n]{0,5}",
    ) {
        let mut state = SessionState::Idle;
        let mut ctx = keyed_context();
        for event in prefix {
            let _ = step(&mut state, &mut ctx, event);
        }

        let before_state = state;
        let before_len = ctx.transcript.len();
        let requests = step(&mut state, &mut ctx, Event::Chat { text: blank }).unwrap();

        prop_assert!(requests.is_empty());
        prop_assert_eq!(state, before_state);
        prop_assert_eq!(ctx.transcript.len(), before_len);
    }

    // Summarize + successful completion leaves exactly one assistant message
    // equal to the trimmed reply, whatever came before
    #[test]
    fn prop_summarize_resets_transcript(
        prior in 1usize..10,
        source in arb_source(),
        reply in "[ ]{0,3}[a-zA-Z][a-zA-Z ]{0,40}[ \n]{0,3}",
    ) {
        let mut state = SessionState::Ready;
        let mut ctx = keyed_context();
        for i in 0..prior {
            ctx.transcript.append(MessageRole::User, format!("q{i}"), false);
        }

        step(&mut state, &mut ctx, Event::Summarize { source }).unwrap();
        step(&mut state, &mut ctx, Event::CompletionSuccess { text: reply.clone() }).unwrap();

        prop_assert_eq!(state, SessionState::Ready);
        prop_assert_eq!(ctx.transcript.len(), 1);
        let msg = &ctx.transcript.messages()[0];
        prop_assert_eq!(msg.role, MessageRole::Assistant);
        prop_assert_eq!(msg.content.as_str(), reply.trim());
    }

    // Failed is never terminal: the next chat starts a new exchange
    #[test]
    fn prop_failed_always_recoverable(message in "[a-zA-Z ]{1,30}", text in "[a-zA-Z]{1,20}") {
        let mut state = SessionState::AwaitingCompletion;
        let mut ctx = keyed_context();

        step(&mut state, &mut ctx, Event::CompletionFailure {
            error: SummarizerError::completion(message),
        }).unwrap();
        prop_assert_eq!(state, SessionState::Failed);
        prop_assert!(ctx.transcript.last().unwrap().is_error);

        let requests = step(&mut state, &mut ctx, Event::Chat { text }).unwrap();
        prop_assert_eq!(state, SessionState::AwaitingCompletion);
        prop_assert_eq!(requests.len(), 1);
    }

    // A request uses the model cached when its command was processed
    #[test]
    fn prop_request_uses_cached_model(
        changes in proptest::collection::vec(arb_model(), 1..6),
        later in arb_model(),
    ) {
        let mut state = SessionState::Idle;
        let mut ctx = keyed_context();
        for model in &changes {
            step(&mut state, &mut ctx, Event::ModelChanged { model: *model }).unwrap();
        }

        let requests = step(&mut state, &mut ctx, Event::Chat { text: "hello".into() }).unwrap();
        let expected = *changes.last().unwrap();
        prop_assert_eq!(requests[0], expected);

        // A change while in flight updates the shadow but not the sent request
        step(&mut state, &mut ctx, Event::ModelChanged { model: later }).unwrap();
        prop_assert_eq!(state, SessionState::AwaitingCompletion);
        prop_assert_eq!(ctx.config.model, later);
    }
}
