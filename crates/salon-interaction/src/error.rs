//! Error types for the LLM boundary.

use thiserror::Error;

/// Errors that can occur while talking to the completion endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never reached the endpoint (connect/timeout/transport).
    #[error("API request failed: {message}")]
    Request { message: String, is_retryable: bool },

    /// The endpoint answered with a non-success status.
    #[error("API returned status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        is_retryable: bool,
    },

    /// 401 from the endpoint. Surfaced distinctly so callers can prompt for
    /// a key instead of cycling through fallbacks.
    #[error("401 Unauthorized: check your API key")]
    Unauthorized,

    /// A 2xx response that carried no usable assistant content.
    #[error("API returned no content in the response")]
    EmptyResponse,

    /// The response body could not be decoded.
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// The configured base URL is not a valid URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Whether a retry with the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { is_retryable, .. } | Self::Status { is_retryable, .. } => *is_retryable,
            Self::Unauthorized | Self::EmptyResponse | Self::Parse(_) | Self::InvalidBaseUrl(_) => {
                false
            }
        }
    }
}
