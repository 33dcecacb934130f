//! Completion client for OpenAI-compatible endpoints.
//!
//! Talks to `POST {base_url}/chat/completions` with bearer auth and returns
//! the raw assistant text. The [`ChatCompletion`] trait is the seam callers
//! program against so tests can substitute a scripted client.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// A role-tagged turn on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request payload for the chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// The completion call, abstracted for testability.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Sends a completion request and returns the first choice's content.
    async fn chat(
        &self,
        base_url: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, ApiError>;
}

/// HTTP implementation over a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct CompletionClient {
    http: Client,
}

impl CompletionClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// GET with bearer auth, decoded as JSON. Used by the model-listing probe.
    pub async fn get_json(
        &self,
        url: &str,
        api_key: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|err| ApiError::Request {
                message: format!("request to {url} failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body));
        }

        response
            .json()
            .await
            .map_err(|err| ApiError::Parse(err.to_string()))
    }
}

#[async_trait]
impl ChatCompletion for CompletionClient {
    async fn chat(
        &self,
        base_url: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, ApiError> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&endpoint)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| ApiError::Request {
                message: format!("request to {endpoint} failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Parse(err.to_string()))?;

        extract_text(parsed)
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text(response: CompletionResponse) -> Result<String, ApiError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(ApiError::EmptyResponse)
}

fn map_http_error(status: StatusCode, body: String) -> ApiError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    ApiError::Status {
        status: status.as_u16(),
        message,
        is_retryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_first_choice() {
        let response = CompletionResponse {
            choices: vec![
                Choice {
                    message: ResponseMessage {
                        content: Some("first".to_string()),
                    },
                },
                Choice {
                    message: ResponseMessage {
                        content: Some("second".to_string()),
                    },
                },
            ],
        };
        assert_eq!(extract_text(response).unwrap(), "first");
    }

    #[test]
    fn test_extract_text_empty_choices() {
        let response = CompletionResponse { choices: vec![] };
        assert!(matches!(
            extract_text(response),
            Err(ApiError::EmptyResponse)
        ));
    }

    #[test]
    fn test_map_http_error_reads_error_body() {
        let err = map_http_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"model melted"}}"#.to_string(),
        );
        match err {
            ApiError::Status {
                status,
                message,
                is_retryable,
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "model melted");
                assert!(is_retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_http_error_falls_back_to_raw_body() {
        let err = map_http_error(StatusCode::BAD_REQUEST, "plain text".to_string());
        match err {
            ApiError::Status {
                status,
                message,
                is_retryable,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "plain text");
                assert!(!is_retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
