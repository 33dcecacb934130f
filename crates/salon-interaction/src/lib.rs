//! LLM boundary for Salon: the OpenAI-compatible completion client, the
//! model-listing probe, prompt assembly, moderator selection, reply
//! generation, and output sanitization.

pub mod client;
pub mod error;
pub mod models;
pub mod moderator;
pub mod prompt;
pub mod reply;
pub mod sanitize;

pub use client::{ChatCompletion, CompletionClient, CompletionRequest, WireMessage};
pub use error::ApiError;
pub use models::{ModelCatalog, fetch_available_models};
