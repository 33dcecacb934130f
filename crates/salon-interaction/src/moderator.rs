//! The moderator: model-backed next-speaker selection.
//!
//! Asks the endpoint "who speaks next" over the recent context and parses a
//! structured answer out of free-form model text. Every failure mode maps to
//! `None`; the caller treats all of them as "no moderator opinion" and falls
//! back to a random pick.

use crate::client::{ChatCompletion, CompletionRequest, WireMessage};
use crate::prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use salon_core::config::AiConfig;
use salon_core::persona::Persona;
use salon_core::session::ChatMessage;
use serde::Deserialize;

/// Deterministic-leaning sampling for a selection task.
pub const MODERATOR_TEMPERATURE: f32 = 0.1;

/// Small ceiling: the answer is one id, and the call is latency-sensitive.
pub const MODERATOR_MAX_TOKENS: u32 = 100;

/// Tolerant match for the id when strict JSON parsing fails: unquoted keys,
/// single quotes, and `=` separators all occur in the wild.
static SPEAKER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?nextSpeakerId["']?\s*[:=]\s*["']?([^"'\s,}]+)["']?"#)
        .expect("valid speaker-id pattern")
});

#[derive(Deserialize)]
struct ModeratorVerdict {
    #[serde(rename = "nextSpeakerId")]
    next_speaker_id: Option<String>,
}

/// Picks the next speaker from `candidates` given the recent non-system
/// history. Returns `None` on any failure or when the answer is not a
/// candidate; never an error.
pub async fn select_next_speaker<C: ChatCompletion>(
    client: &C,
    config: &AiConfig,
    recent: &[ChatMessage],
    roster: &[Persona],
    candidates: &[Persona],
) -> Option<String> {
    if candidates.is_empty() || !config.is_configured() {
        return None;
    }
    // Trivial case: with one candidate there is nothing to moderate.
    if candidates.len() == 1 {
        return Some(candidates[0].id.clone());
    }

    let request = CompletionRequest {
        model: config.moderator_model_or_default().to_string(),
        messages: vec![WireMessage::user(prompt::moderator_prompt(
            recent, roster, candidates,
        ))],
        temperature: MODERATOR_TEMPERATURE,
        max_tokens: MODERATOR_MAX_TOKENS,
        stream: false,
    };

    let text = match client.chat(&config.base_url, &config.api_key, &request).await {
        Ok(text) => text,
        Err(err) => {
            log::warn!("moderator call failed: {err}");
            return None;
        }
    };

    parse_speaker_id(&text).filter(|id| candidates.iter().any(|c| &c.id == id))
}

/// Extracts the `nextSpeakerId` value from model output.
///
/// Strict JSON first (after peeling code fences); a tolerant pattern match
/// second.
fn parse_speaker_id(text: &str) -> Option<String> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let Ok(verdict) = serde_json::from_str::<ModeratorVerdict>(cleaned) {
        if let Some(id) = verdict.next_speaker_id {
            if !id.is_empty() {
                return Some(id);
            }
        }
    }

    SPEAKER_ID
        .captures(cleaned)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
