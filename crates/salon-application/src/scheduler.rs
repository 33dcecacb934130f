//! The turn scheduler.
//!
//! After any message, decides whether and which AI persona responds next
//! (mention -> moderator -> random fallback), runs the generation pipeline
//! under the process-wide single-flight slot, and publishes the result back
//! to the session store. Every exit path releases the slot; no failure here
//! ever escapes to the caller.

use crate::engine::SpeakerEngine;
use crate::typing::TypingSlot;
use rand::Rng;
use rand::seq::SliceRandom;
use salon_core::config::AiConfig;
use salon_core::persona::{Persona, PersonaRegistry};
use salon_core::session::{ChatMessage, ChatSession, SessionStore};
use salon_interaction::prompt::MODERATOR_CONTEXT;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Pacing before an immediate reaction to a human message.
pub const REACTION_DELAY_MS: u64 = 800;

/// Base pacing for auto/manual turns that may consult the moderator.
pub const DELIBERATION_DELAY_MS: u64 = 1500;

/// Random jitter added on top of [`DELIBERATION_DELAY_MS`].
pub const DELIBERATION_JITTER_MS: u64 = 1000;

/// Why a tick produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A generation is already in flight somewhere.
    Busy,
    /// The session does not exist (or vanished mid-flight).
    SessionNotFound,
    /// The session has no messages to respond to.
    EmptySession,
    /// No API key configured; a prerequisite, not an error.
    NotConfigured,
    /// Last message is from an AI and neither auto mode nor a manual
    /// trigger asked for a follow-up.
    NotAddressed,
    /// Nobody is eligible to speak.
    NoCandidates,
    /// Both the resolved and the fallback model failed; the next tick
    /// retries.
    GenerationFailed,
}

/// Result of one `try_advance` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A reply was generated and appended.
    Replied(ChatMessage),
    /// No reply this tick.
    Skipped(SkipReason),
}

/// Orchestrates turn-taking across all sessions.
pub struct TurnScheduler {
    store: Arc<dyn SessionStore>,
    registry: Arc<dyn PersonaRegistry>,
    engine: Arc<dyn SpeakerEngine>,
    config: Arc<RwLock<AiConfig>>,
    slot: TypingSlot,
}

impl TurnScheduler {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: Arc<dyn PersonaRegistry>,
        engine: Arc<dyn SpeakerEngine>,
        config: AiConfig,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            config: Arc::new(RwLock::new(config)),
            slot: TypingSlot::new(),
        }
    }

    /// The `(session_id, persona_id)` currently shown as typing, if any.
    pub fn typing(&self) -> Option<(String, String)> {
        self.slot.typing()
    }

    pub async fn global_config(&self) -> AiConfig {
        self.config.read().await.clone()
    }

    pub async fn set_global_config(&self, config: AiConfig) {
        *self.config.write().await = config;
    }

    /// Advances the conversation in one session by at most one AI turn.
    ///
    /// `manual` marks an explicit user trigger, which permits an AI-to-AI
    /// follow-up even with auto mode off. Never returns an error: failures
    /// inside the pipeline are logged and reported as [`TurnOutcome::Skipped`].
    pub async fn try_advance(&self, session_id: &str, manual: bool) -> TurnOutcome {
        if self.slot.is_busy() {
            return TurnOutcome::Skipped(SkipReason::Busy);
        }

        let Some(session) = self.store.get_session(session_id).await else {
            return TurnOutcome::Skipped(SkipReason::SessionNotFound);
        };

        let config = self.config.read().await.merged_with(session.config.as_ref());
        if !config.is_configured() {
            tracing::info!(
                target: "turns",
                session = %session.id,
                "no API key configured, skipping turn"
            );
            return TurnOutcome::Skipped(SkipReason::NotConfigured);
        }

        let Some(last) = session.last_message().cloned() else {
            return TurnOutcome::Skipped(SkipReason::EmptySession);
        };

        let auto = self.store.auto_flag(session_id).await;

        // AI never responds to AI unless auto mode or an explicit trigger
        // asks for it.
        if !auto && !manual && !self.sender_is_human(&last.sender_id).await {
            return TurnOutcome::Skipped(SkipReason::NotAddressed);
        }

        let candidates = self.eligible_candidates(&session, &last.sender_id).await;
        if candidates.is_empty() {
            return TurnOutcome::Skipped(SkipReason::NoCandidates);
        }

        // The slot covers the whole pipeline, moderator query included.
        let Some(guard) = self.slot.try_acquire(session_id) else {
            return TurnOutcome::Skipped(SkipReason::Busy);
        };

        let roster = self.registry.list().await;
        let selected = match mention_match(&last.content, &candidates) {
            Some(persona) => persona,
            None => {
                self.deliberate(&config, &session, &candidates, &roster, auto, manual)
                    .await
            }
        };

        guard.set_typing(&selected.id);
        tracing::debug!(
            target: "turns",
            session = %session.id,
            persona = %selected.id,
            "typing"
        );

        let delay = if auto || manual {
            let jitter = rand::thread_rng().gen_range(0..DELIBERATION_JITTER_MS);
            Duration::from_millis(DELIBERATION_DELAY_MS + jitter)
        } else {
            Duration::from_millis(REACTION_DELAY_MS)
        };
        tokio::time::sleep(delay).await;

        // Re-read: the human may have typed during the pacing delay.
        let Some(fresh) = self.store.get_session(session_id).await else {
            return TurnOutcome::Skipped(SkipReason::SessionNotFound);
        };

        match self
            .engine
            .generate(&config, &selected, &roster, &fresh.messages)
            .await
        {
            Ok(content) => {
                let message = ChatMessage::from_sender(selected.id.clone(), content);
                match self.store.append_message(session_id, message.clone()).await {
                    Ok(()) => TurnOutcome::Replied(message),
                    Err(err) => {
                        tracing::error!(
                            target: "turns",
                            session = %session_id,
                            "failed to append reply: {err}"
                        );
                        TurnOutcome::Skipped(SkipReason::GenerationFailed)
                    }
                }
            }
            Err(err) => {
                // Auto mode stays on; the next tick retries.
                tracing::error!(
                    target: "turns",
                    session = %session_id,
                    persona = %selected.id,
                    "generation failed: {err}"
                );
                TurnOutcome::Skipped(SkipReason::GenerationFailed)
            }
        }
        // `guard` drops here, releasing the slot and the typing indicator on
        // every path above.
    }

    async fn sender_is_human(&self, sender_id: &str) -> bool {
        match self.registry.get(sender_id).await {
            Some(persona) => persona.is_human,
            None => false,
        }
    }

    /// Participants eligible to respond: resolvable, not human, and not the
    /// sender of the message being responded to.
    async fn eligible_candidates(&self, session: &ChatSession, last_sender: &str) -> Vec<Persona> {
        let mut candidates = Vec::new();
        for id in &session.participant_ids {
            if id == last_sender {
                continue;
            }
            if let Some(persona) = self.registry.get(id).await {
                if !persona.is_human {
                    candidates.push(persona);
                }
            }
        }
        candidates
    }

    /// Moderator-or-random selection for turns without a mention winner.
    async fn deliberate(
        &self,
        config: &AiConfig,
        session: &ChatSession,
        candidates: &[Persona],
        roster: &[Persona],
        auto: bool,
        manual: bool,
    ) -> Persona {
        if candidates.len() == 1 {
            return candidates[0].clone();
        }

        if auto || manual {
            let recent: Vec<ChatMessage> = session
                .recent_non_system(MODERATOR_CONTEXT)
                .into_iter()
                .cloned()
                .collect();
            if let Some(id) = self
                .engine
                .select_speaker(config, &recent, roster, candidates)
                .await
            {
                if let Some(persona) = candidates.iter().find(|c| c.id == id) {
                    return persona.clone();
                }
                tracing::debug!(
                    target: "turns",
                    session = %session.id,
                    "moderator answer '{id}' not eligible, falling back to random"
                );
            }
        }

        candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }
}

/// Case-insensitive scan for a candidate's full name or `@first-name`.
/// Selects only when exactly one candidate is addressed; an ambiguous
/// message goes to the moderator instead.
fn mention_match(content: &str, candidates: &[Persona]) -> Option<Persona> {
    let lowered = content.to_lowercase();
    let mut matches = candidates.iter().filter(|p| {
        let name = p.name.to_lowercase();
        let handle = format!("@{}", p.first_name().to_lowercase());
        lowered.contains(&name) || lowered.contains(&handle)
    });

    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.clone())
}
