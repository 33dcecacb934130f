//! Speaker engine seam.
//!
//! The scheduler talks to the LLM boundary through this trait so tests can
//! script selection and generation without a network.

use async_trait::async_trait;
use salon_core::config::AiConfig;
use salon_core::persona::Persona;
use salon_core::session::ChatMessage;
use salon_interaction::error::ApiError;
use salon_interaction::{CompletionClient, moderator, reply};

/// Moderator selection plus reply generation, as one collaborator.
#[async_trait]
pub trait SpeakerEngine: Send + Sync {
    /// Asks the moderator who should speak next. `None` means "no opinion".
    async fn select_speaker(
        &self,
        config: &AiConfig,
        recent: &[ChatMessage],
        roster: &[Persona],
        candidates: &[Persona],
    ) -> Option<String>;

    /// Produces a sanitized, persona-voiced reply over the history.
    async fn generate(
        &self,
        config: &AiConfig,
        target: &Persona,
        roster: &[Persona],
        history: &[ChatMessage],
    ) -> Result<String, ApiError>;
}

/// Production engine delegating to the completion endpoint.
#[derive(Clone, Default)]
pub struct ApiSpeakerEngine {
    client: CompletionClient,
}

impl ApiSpeakerEngine {
    pub fn new() -> Self {
        Self {
            client: CompletionClient::new(),
        }
    }
}

#[async_trait]
impl SpeakerEngine for ApiSpeakerEngine {
    async fn select_speaker(
        &self,
        config: &AiConfig,
        recent: &[ChatMessage],
        roster: &[Persona],
        candidates: &[Persona],
    ) -> Option<String> {
        moderator::select_next_speaker(&self.client, config, recent, roster, candidates).await
    }

    async fn generate(
        &self,
        config: &AiConfig,
        target: &Persona,
        roster: &[Persona],
        history: &[ChatMessage],
    ) -> Result<String, ApiError> {
        reply::generate_reply(&self.client, config, target, roster, history).await
    }
}
