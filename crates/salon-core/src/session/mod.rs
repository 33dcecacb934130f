//! Chat sessions: ordered message histories with a participant roster.

pub mod message;
pub mod model;
pub mod store;

pub use message::{ChatMessage, SYSTEM_SENDER};
pub use model::ChatSession;
pub use store::{InMemorySessionStore, SessionStore};
