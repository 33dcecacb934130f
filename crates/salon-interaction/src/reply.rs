//! Persona reply generation.
//!
//! Produces persona-voiced reply text with model fallback: if the resolved
//! model fails and differs from the safe fallback, one retry with the
//! fallback is attempted before the failure surfaces.

use crate::client::{ChatCompletion, CompletionRequest, WireMessage};
use crate::error::ApiError;
use crate::prompt;
use crate::sanitize;
use salon_core::config::AiConfig;
use salon_core::persona::Persona;
use salon_core::session::ChatMessage;

/// High-variance sampling: replies should read like chat, not documentation.
pub const REPLY_TEMPERATURE: f32 = 0.9;

pub const REPLY_MAX_TOKENS: u32 = 500;

/// Generates a sanitized reply for `target` over the given history.
///
/// Fails with an [`ApiError`] only when no model could be reached at all.
pub async fn generate_reply<C: ChatCompletion>(
    client: &C,
    config: &AiConfig,
    target: &Persona,
    roster: &[Persona],
    history: &[ChatMessage],
) -> Result<String, ApiError> {
    let messages = prompt::reply_messages(target, roster, history);
    let primary = config.resolve_model(target.model.as_deref()).to_string();
    let fallback = config.safe_fallback_model().to_string();

    let raw = match request_with(client, config, &primary, &messages).await {
        Ok(raw) => raw,
        Err(err) if primary != fallback => {
            log::warn!("model '{primary}' failed ({err}), retrying with fallback '{fallback}'");
            request_with(client, config, &fallback, &messages).await?
        }
        Err(err) => return Err(err),
    };

    Ok(sanitize::clean_reply(&raw, &target.name))
}

async fn request_with<C: ChatCompletion>(
    client: &C,
    config: &AiConfig,
    model: &str,
    messages: &[WireMessage],
) -> Result<String, ApiError> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages: messages.to_vec(),
        temperature: REPLY_TEMPERATURE,
        max_tokens: REPLY_MAX_TOKENS,
        stream: false,
    };
    client.chat(&config.base_url, &config.api_key, &request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted client recording which models were requested.
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, ApiError>>>,
        requested_models: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, ApiError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requested_models: Mutex::new(Vec::new()),
            }
        }

        fn requested_models(&self) -> Vec<String> {
            self.requested_models.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedClient {
        async fn chat(
            &self,
            _base_url: &str,
            _api_key: &str,
            request: &CompletionRequest,
        ) -> Result<String, ApiError> {
            self.requested_models
                .lock()
                .unwrap()
                .push(request.model.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn config() -> AiConfig {
        AiConfig::new("sk-test", "https://api.example/v1", "default-model")
    }

    fn ada() -> Persona {
        Persona::ai("ai-ada", "Ada", "mathematician", "You are Ada.")
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "boom".to_string(),
            is_retryable: true,
        }
    }

    #[tokio::test]
    async fn test_success_is_sanitized() {
        let client = ScriptedClient::new(vec![Ok("Ada: \"hello\"".to_string())]);

        let reply = generate_reply(&client, &config(), &ada(), &[], &[])
            .await
            .unwrap();

        assert_eq!(reply, "hello");
        assert_eq!(client.requested_models(), vec!["default-model"]);
    }

    #[tokio::test]
    async fn test_persona_model_failure_retries_fallback_once() {
        let client = ScriptedClient::new(vec![Err(server_error()), Ok("recovered".to_string())]);
        let persona = ada().with_model("exotic-model");

        let reply = generate_reply(&client, &config(), &persona, &[], &[])
            .await
            .unwrap();

        assert_eq!(reply, "recovered");
        assert_eq!(
            client.requested_models(),
            vec!["exotic-model", "default-model"]
        );
    }

    #[tokio::test]
    async fn test_primary_equals_fallback_fails_without_retry() {
        let client = ScriptedClient::new(vec![Err(server_error())]);

        let result = generate_reply(&client, &config(), &ada(), &[], &[]).await;

        assert!(result.is_err());
        assert_eq!(client.requested_models(), vec!["default-model"]);
    }

    #[tokio::test]
    async fn test_both_models_failing_surfaces_the_second_error() {
        let client = ScriptedClient::new(vec![Err(server_error()), Err(server_error())]);
        let persona = ada().with_model("exotic-model");

        let result = generate_reply(&client, &config(), &persona, &[], &[]).await;

        assert!(result.is_err());
        assert_eq!(
            client.requested_models(),
            vec!["exotic-model", "default-model"]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_becomes_placeholder() {
        let client = ScriptedClient::new(vec![Ok("<think>nothing to say</think>".to_string())]);

        let reply = generate_reply(&client, &config(), &ada(), &[], &[])
            .await
            .unwrap();

        assert_eq!(reply, sanitize::EMPTY_REPLY_PLACEHOLDER);
    }
}
