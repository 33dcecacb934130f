//! AI endpoint configuration and the model resolution chain.
//!
//! A single global `AiConfig` can be overridden per session; the effective
//! configuration for a call is the field-wise merge of both. Model names
//! resolve persona override -> configured default -> hard fallback.

use serde::{Deserialize, Serialize};
use std::env;

/// Model used when neither the persona nor the configuration names one.
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI-compatible endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for an OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    /// Bearer token for the endpoint. Empty means "not configured".
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`. Trailing slashes are tolerated.
    pub base_url: String,
    /// Default model for reply generation.
    pub model: String,
    /// Optional override for the moderator (next-speaker) calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator_model: Option<String>,
}

impl AiConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            moderator_model: None,
        }
    }

    /// Loads configuration from `SALON_API_KEY`, `SALON_BASE_URL`,
    /// `SALON_MODEL` and `SALON_MODERATOR_MODEL` environment variables.
    ///
    /// Missing URL and model fall back to defaults; a missing key leaves the
    /// config unconfigured rather than failing.
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("SALON_API_KEY").unwrap_or_default(),
            base_url: env::var("SALON_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: env::var("SALON_MODEL").unwrap_or_else(|_| FALLBACK_MODEL.to_string()),
            moderator_model: env::var("SALON_MODERATOR_MODEL").ok(),
        }
    }

    /// An API key is the prerequisite for any network call.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Field-wise merge: a non-empty override field wins over the global one.
    pub fn merged_with(&self, session_override: Option<&AiConfig>) -> AiConfig {
        let Some(over) = session_override else {
            return self.clone();
        };
        AiConfig {
            api_key: pick(&over.api_key, &self.api_key),
            base_url: pick(&over.base_url, &self.base_url),
            model: pick(&over.model, &self.model),
            moderator_model: over
                .moderator_model
                .clone()
                .or_else(|| self.moderator_model.clone()),
        }
    }

    /// Resolves the model for a reply: persona override -> configured default
    /// -> [`FALLBACK_MODEL`].
    pub fn resolve_model<'a>(&'a self, persona_model: Option<&'a str>) -> &'a str {
        match persona_model {
            Some(model) if !model.is_empty() => model,
            _ => self.safe_fallback_model(),
        }
    }

    /// The model retried when a persona-specific model fails: configured
    /// default -> [`FALLBACK_MODEL`].
    pub fn safe_fallback_model(&self) -> &str {
        if self.model.is_empty() {
            FALLBACK_MODEL
        } else {
            &self.model
        }
    }

    /// Model used for moderator calls: moderator override -> default chain.
    pub fn moderator_model_or_default(&self) -> &str {
        match &self.moderator_model {
            Some(model) if !model.is_empty() => model,
            _ => self.safe_fallback_model(),
        }
    }
}

fn pick(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}
