//! Chat session domain model.
//!
//! A session is the unit of turn-taking: an ordered message history plus a
//! participant roster. The scheduler operates on exactly one session per
//! invocation.

use super::message::ChatMessage;
use crate::config::AiConfig;
use serde::{Deserialize, Serialize};

/// One chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier
    pub id: String,
    /// Human-readable session name
    pub name: String,
    /// Participant persona ids, including exactly one human
    pub participant_ids: Vec<String>,
    /// Ordered message history
    pub messages: Vec<ChatMessage>,
    /// Group chat vs. direct chat
    pub is_group: bool,
    /// Unix milliseconds of the most recent append
    pub last_message_at: i64,
    /// Optional per-session endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AiConfig>,
}

impl ChatSession {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        participant_ids: Vec<String>,
        is_group: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            participant_ids,
            messages: Vec::new(),
            is_group,
            last_message_at: 0,
            config: None,
        }
    }

    /// The most recently appended message.
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// The last `n` non-system messages, oldest first.
    pub fn recent_non_system(&self, n: usize) -> Vec<&ChatMessage> {
        let mut tail: Vec<&ChatMessage> = self
            .messages
            .iter()
            .rev()
            .filter(|m| !m.is_system)
            .take(n)
            .collect();
        tail.reverse();
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_non_system_skips_meta_messages() {
        let mut session = ChatSession::new("s1", "test", vec!["user-me".into()], true);
        session.messages.push(ChatMessage::system("Group created"));
        session.messages.push(ChatMessage::from_sender("user-me", "one"));
        session.messages.push(ChatMessage::from_sender("ai-a", "two"));
        session.messages.push(ChatMessage::system("Invited Ada to the group"));
        session.messages.push(ChatMessage::from_sender("user-me", "three"));

        let recent = session.recent_non_system(2);
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[test]
    fn test_last_message_on_empty_session() {
        let session = ChatSession::new("s1", "test", vec![], false);
        assert!(session.last_message().is_none());
    }
}
