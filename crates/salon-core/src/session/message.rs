//! Chat message types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender id used for system/meta messages ("Group created", invites).
pub const SYSTEM_SENDER: &str = "system";

/// A single message in a session's history.
///
/// Messages are immutable once appended; ordering within a session is
/// insertion order and timestamps are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier (UUID format)
    pub id: String,
    /// Persona id of the sender, or [`SYSTEM_SENDER`]
    pub sender_id: String,
    /// Message body
    pub content: String,
    /// Unix milliseconds at creation
    pub timestamp: i64,
    /// System/meta messages never count as conversational turns
    #[serde(default)]
    pub is_system: bool,
}

impl ChatMessage {
    /// Creates a conversational message from a persona.
    pub fn from_sender(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp: now_millis(),
            is_system: false,
        }
    }

    /// Creates a system/meta message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: SYSTEM_SENDER.to_string(),
            content: content.into(),
            timestamp: now_millis(),
            is_system: true,
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sender_is_not_system() {
        let msg = ChatMessage::from_sender("ai-ada", "hello");
        assert!(!msg.is_system);
        assert_eq!(msg.sender_id, "ai-ada");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_system_message_sender() {
        let msg = ChatMessage::system("Group created");
        assert!(msg.is_system);
        assert_eq!(msg.sender_id, SYSTEM_SENDER);
    }
}
