//! End-to-end turn-taking scenarios over the in-memory store with a
//! scripted speaker engine. Time is paused; pacing delays auto-advance.

use async_trait::async_trait;
use salon_application::engine::SpeakerEngine;
use salon_application::poller::AutoContinuationPoller;
use salon_application::scheduler::{SkipReason, TurnOutcome, TurnScheduler};
use salon_core::config::AiConfig;
use salon_core::persona::{InMemoryPersonaRegistry, Persona, PersonaRegistry};
use salon_core::session::{ChatMessage, InMemorySessionStore, SessionStore};
use salon_interaction::error::ApiError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted engine: configurable moderator answer, queued generation
/// results, and full call recording.
#[derive(Default)]
struct MockEngine {
    moderator_answer: Option<String>,
    moderator_calls: Mutex<u32>,
    generate_errors: Mutex<VecDeque<ApiError>>,
    generate_histories: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockEngine {
    fn new() -> Self {
        Self::default()
    }

    fn with_moderator_answer(mut self, id: &str) -> Self {
        self.moderator_answer = Some(id.to_string());
        self
    }

    fn failing_once(self) -> Self {
        self.generate_errors.lock().unwrap().push_back(server_error());
        self
    }

    fn moderator_calls(&self) -> u32 {
        *self.moderator_calls.lock().unwrap()
    }

    fn last_generate_history(&self) -> Option<Vec<ChatMessage>> {
        self.generate_histories.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpeakerEngine for MockEngine {
    async fn select_speaker(
        &self,
        _config: &AiConfig,
        _recent: &[ChatMessage],
        _roster: &[Persona],
        _candidates: &[Persona],
    ) -> Option<String> {
        *self.moderator_calls.lock().unwrap() += 1;
        self.moderator_answer.clone()
    }

    async fn generate(
        &self,
        _config: &AiConfig,
        _target: &Persona,
        _roster: &[Persona],
        history: &[ChatMessage],
    ) -> Result<String, ApiError> {
        self.generate_histories.lock().unwrap().push(history.to_vec());
        if let Some(err) = self.generate_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok("a measured reply".to_string())
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: "upstream exploded".to_string(),
        is_retryable: true,
    }
}

fn config() -> AiConfig {
    AiConfig::new("sk-test", "https://api.example/v1", "test-model")
}

fn human() -> Persona {
    Persona::human("user-me", "Me")
}

fn ada() -> Persona {
    Persona::ai("ai-ada", "Ada Lovelace", "mathematician", "You are Ada.")
}

fn alan() -> Persona {
    Persona::ai("ai-alan", "Alan Turing", "logician", "You are Alan.")
}

fn grace() -> Persona {
    Persona::ai("ai-grace", "Grace Hopper", "engineer", "You are Grace.")
}

struct Fixture {
    store: Arc<InMemorySessionStore>,
    engine: Arc<MockEngine>,
    scheduler: Arc<TurnScheduler>,
    session_id: String,
}

async fn fixture(personas: Vec<Persona>, engine: MockEngine, config: AiConfig) -> Fixture {
    let participant_ids: Vec<String> = personas.iter().map(|p| p.id.clone()).collect();
    let registry: Arc<dyn PersonaRegistry> =
        Arc::new(InMemoryPersonaRegistry::with_personas(personas));
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_group("test chat", participant_ids).await;
    let engine = Arc::new(engine);
    let scheduler = Arc::new(TurnScheduler::new(
        store.clone() as Arc<dyn SessionStore>,
        registry,
        engine.clone(),
        config,
    ));
    Fixture {
        store,
        engine,
        scheduler,
        session_id,
    }
}

async fn say(fixture: &Fixture, sender: &str, content: &str) {
    fixture
        .store
        .append_message(&fixture.session_id, ChatMessage::from_sender(sender, content))
        .await
        .unwrap();
}

fn replied_sender(outcome: &TurnOutcome) -> Option<String> {
    match outcome {
        TurnOutcome::Replied(msg) => Some(msg.sender_id.clone()),
        TurnOutcome::Skipped(_) => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_mention_selects_the_named_persona_without_moderation() {
    let f = fixture(vec![human(), ada(), alan(), grace()], MockEngine::new(), config()).await;
    say(&f, "user-me", "I'd like to hear what Ada Lovelace makes of this").await;

    let outcome = f.scheduler.try_advance(&f.session_id, false).await;

    assert_eq!(replied_sender(&outcome), Some("ai-ada".to_string()));
    assert_eq!(f.engine.moderator_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auto_turn_never_selects_the_previous_sender() {
    let f = fixture(vec![human(), ada(), alan()], MockEngine::new(), config()).await;
    say(&f, "user-me", "hello both").await;
    say(&f, "ai-ada", "hello!").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    let before = f.store.get_session(&f.session_id).await.unwrap().messages.len();
    let outcome = f.scheduler.try_advance(&f.session_id, false).await;
    let after = f.store.get_session(&f.session_id).await.unwrap().messages.len();

    // Single eligible candidate: selected directly, no moderator involved.
    assert_eq!(replied_sender(&outcome), Some("ai-alan".to_string()));
    assert_eq!(f.engine.moderator_calls(), 0);
    assert_eq!(after, before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_invocations_degrade_to_busy_no_ops() {
    let f = fixture(vec![human(), ada(), alan()], MockEngine::new(), config()).await;
    say(&f, "user-me", "talk amongst yourselves").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    // Second session targeted while the first generation is in flight.
    let other = f
        .store
        .create_group("other chat", vec!["user-me".into(), "ai-ada".into(), "ai-alan".into()])
        .await;
    f.store
        .append_message(&other, ChatMessage::from_sender("user-me", "over here too"))
        .await
        .unwrap();

    let scheduler = f.scheduler.clone();
    let session_id = f.session_id.clone();
    let first = tokio::spawn(async move { scheduler.try_advance(&session_id, false).await });

    // Let the first invocation claim the slot and reach its pacing delay.
    while f.scheduler.typing().is_none() {
        tokio::task::yield_now().await;
    }

    let typing = f.scheduler.typing().unwrap();
    assert_eq!(typing.0, f.session_id);

    // Any invocation anywhere is a no-op while the slot is held.
    let second = f.scheduler.try_advance(&other, false).await;
    assert_eq!(second, TurnOutcome::Skipped(SkipReason::Busy));
    // The typing indicator still points at the first session only.
    assert_eq!(f.scheduler.typing().unwrap().0, f.session_id);

    let outcome = first.await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied(_)));
    assert_eq!(f.scheduler.typing(), None);
}

#[tokio::test(start_paused = true)]
async fn test_generation_failure_keeps_auto_on_and_releases_the_slot() {
    let f = fixture(
        vec![human(), ada(), alan()],
        MockEngine::new().failing_once(),
        config(),
    )
    .await;
    say(&f, "user-me", "anyone?").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    let before = f.store.get_session(&f.session_id).await.unwrap().messages.len();
    let outcome = f.scheduler.try_advance(&f.session_id, false).await;

    assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::GenerationFailed));
    let after = f.store.get_session(&f.session_id).await.unwrap().messages.len();
    assert_eq!(after, before);
    assert!(f.store.auto_flag(&f.session_id).await);
    assert_eq!(f.scheduler.typing(), None);

    // The next tick proceeds: the slot was not leaked by the failure.
    let retry = f.scheduler.try_advance(&f.session_id, false).await;
    assert!(matches!(retry, TurnOutcome::Replied(_)));
}

#[tokio::test(start_paused = true)]
async fn test_missing_api_key_is_a_quiet_no_op() {
    let unconfigured = AiConfig::new("", "https://api.example/v1", "test-model");
    let f = fixture(vec![human(), ada()], MockEngine::new(), unconfigured).await;
    say(&f, "user-me", "hello?").await;

    let outcome = f.scheduler.try_advance(&f.session_id, true).await;

    assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::NotConfigured));
    assert!(f.engine.last_generate_history().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ai_to_ai_reply_requires_auto_or_manual() {
    let f = fixture(vec![human(), ada(), alan()], MockEngine::new(), config()).await;
    say(&f, "user-me", "hi").await;
    say(&f, "ai-ada", "hi yourself").await;

    let passive = f.scheduler.try_advance(&f.session_id, false).await;
    assert_eq!(passive, TurnOutcome::Skipped(SkipReason::NotAddressed));

    let manual = f.scheduler.try_advance(&f.session_id, true).await;
    assert_eq!(replied_sender(&manual), Some("ai-alan".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_direct_chat_has_no_candidate_after_the_ai_spoke() {
    let f = fixture(vec![human(), ada()], MockEngine::new(), config()).await;
    say(&f, "ai-ada", "my last word").await;

    let outcome = f.scheduler.try_advance(&f.session_id, true).await;

    assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::NoCandidates));
}

#[tokio::test(start_paused = true)]
async fn test_generation_reads_messages_sent_during_the_pacing_delay() {
    let f = fixture(vec![human(), ada(), alan()], MockEngine::new(), config()).await;
    say(&f, "user-me", "first thought").await;

    let scheduler = f.scheduler.clone();
    let session_id = f.session_id.clone();
    let turn = tokio::spawn(async move { scheduler.try_advance(&session_id, true).await });

    while f.scheduler.typing().is_none() {
        tokio::task::yield_now().await;
    }

    // The human keeps typing while the responder "thinks".
    say(&f, "user-me", "actually, second thought").await;

    let outcome = turn.await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied(_)));

    let seen = f.engine.last_generate_history().unwrap();
    assert!(
        seen.iter().any(|m| m.content == "actually, second thought"),
        "generation should run over the re-read history"
    );
}

#[tokio::test(start_paused = true)]
async fn test_moderator_answer_is_honored_when_eligible() {
    let f = fixture(
        vec![human(), ada(), alan(), grace()],
        MockEngine::new().with_moderator_answer("ai-alan"),
        config(),
    )
    .await;
    say(&f, "user-me", "someone take the floor").await;

    let outcome = f.scheduler.try_advance(&f.session_id, true).await;

    assert_eq!(replied_sender(&outcome), Some("ai-alan".to_string()));
    assert_eq!(f.engine.moderator_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_moderator_answer_outside_candidates_falls_back_to_random() {
    let f = fixture(
        vec![human(), ada(), alan(), grace()],
        MockEngine::new().with_moderator_answer("ai-grace"),
        config(),
    )
    .await;
    say(&f, "user-me", "go on").await;
    // Grace spoke last, so she is excluded even though the moderator names her.
    say(&f, "ai-grace", "my two cents").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    let outcome = f.scheduler.try_advance(&f.session_id, false).await;

    let sender = replied_sender(&outcome).unwrap();
    assert!(sender == "ai-ada" || sender == "ai-alan", "got {sender}");
}

#[tokio::test(start_paused = true)]
async fn test_poller_advances_an_auto_session_each_tick() {
    let f = fixture(vec![human(), ada(), alan()], MockEngine::new(), config()).await;
    say(&f, "user-me", "keep it going without me").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    let mut events = f.store.subscribe();
    let poller = AutoContinuationPoller::new(
        f.scheduler.clone(),
        f.store.clone() as Arc<dyn SessionStore>,
    );
    let handle = poller.spawn();

    let first = events.recv().await.unwrap();
    assert!(first.sender_id == "ai-ada" || first.sender_id == "ai-alan");
    assert_ne!(first.sender_id, "user-me");

    // The loop keeps the conversation going: the next speaker is never the
    // previous one.
    let second = events.recv().await.unwrap();
    assert_ne!(second.sender_id, first.sender_id);
    assert_ne!(second.sender_id, "user-me");

    handle.stop();
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_clearing_history_forces_auto_mode_off() {
    let f = fixture(vec![human(), ada()], MockEngine::new(), config()).await;
    say(&f, "user-me", "hello").await;
    f.store.set_auto_flag(&f.session_id, true).await;

    f.store.clear_history(&f.session_id).await.unwrap();

    assert!(!f.store.auto_flag(&f.session_id).await);
    assert_eq!(f.store.first_auto_session().await, None);
}
