//! Session store.
//!
//! The turn-taking core calls through the [`SessionStore`] trait and does not
//! own persistence. [`InMemorySessionStore`] is the reference implementation;
//! it also carries the session management operations the front-end performs
//! (create, invite, per-session config) and publishes every appended message
//! on a broadcast channel for display layers.

use super::message::ChatMessage;
use super::model::ChatSession;
use crate::config::AiConfig;
use crate::error::{Result, SalonError};
use crate::persona::Persona;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

/// Storage collaborator for the scheduler and poller.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns a snapshot of the session, if it exists.
    async fn get_session(&self, session_id: &str) -> Option<ChatSession>;

    /// Returns snapshots of all sessions in creation order.
    async fn list_sessions(&self) -> Vec<ChatSession>;

    /// Appends a message and bumps the session's `last_message_at`.
    async fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<()>;

    /// Toggles autonomous continuation for a session.
    async fn set_auto_flag(&self, session_id: &str, enabled: bool);

    /// Whether autonomous continuation is on for a session.
    async fn auto_flag(&self, session_id: &str) -> bool;

    /// The first auto-flagged session that has at least one message, in
    /// creation order. This is what the poller advances each tick.
    async fn first_auto_session(&self) -> Option<String>;

    /// Wipes a session's history. Also forces auto mode off so a cleared
    /// session cannot keep self-sustaining.
    async fn clear_history(&self, session_id: &str) -> Result<()>;
}

/// In-memory store, creation-ordered.
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<ChatSession>>,
    auto_flags: RwLock<HashMap<String, bool>>,
    events: broadcast::Sender<ChatMessage>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sessions: RwLock::new(Vec::new()),
            auto_flags: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Subscribes to messages as they are appended, for display layers.
    /// The scheduler never consumes this channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.events.subscribe()
    }

    /// Creates a group session seeded with a "Group created" system message.
    ///
    /// `participant_ids` must include the human participant.
    pub async fn create_group(
        &self,
        name: impl Into<String>,
        participant_ids: Vec<String>,
    ) -> String {
        let id = format!("chat-{}", Uuid::new_v4());
        let mut session = ChatSession::new(id.clone(), name, participant_ids, true);
        let seed = ChatMessage::system("Group created");
        session.last_message_at = seed.timestamp;
        session.messages.push(seed);
        self.sessions.write().await.push(session);
        id
    }

    /// Creates a direct session with one AI persona, reusing an existing one
    /// for the same pair if present.
    pub async fn create_direct(&self, human_id: &str, persona: &Persona) -> String {
        {
            let sessions = self.sessions.read().await;
            if let Some(existing) = sessions.iter().find(|s| {
                !s.is_group
                    && s.participant_ids.iter().any(|id| id == human_id)
                    && s.participant_ids.iter().any(|id| id == &persona.id)
            }) {
                return existing.id.clone();
            }
        }

        let id = format!("chat-dm-{}", persona.id);
        let session = ChatSession::new(
            id.clone(),
            persona.name.clone(),
            vec![human_id.to_string(), persona.id.clone()],
            false,
        );
        self.sessions.write().await.push(session);
        id
    }

    /// Adds a persona to a session, announcing the invite with a system
    /// message. A no-op when the persona is already a participant.
    pub async fn add_participant(&self, session_id: &str, persona: &Persona) -> Result<()> {
        let announcement = {
            let mut sessions = self.sessions.write().await;
            let session = find_mut(&mut sessions, session_id)?;
            if session.participant_ids.iter().any(|id| id == &persona.id) {
                return Ok(());
            }
            session.participant_ids.push(persona.id.clone());
            let msg = ChatMessage::system(format!("Invited {} to the group", persona.name));
            session.last_message_at = msg.timestamp;
            session.messages.push(msg.clone());
            msg
        };
        let _ = self.events.send(announcement);
        Ok(())
    }

    /// Sets or clears the per-session endpoint override.
    pub async fn set_session_config(
        &self,
        session_id: &str,
        config: Option<AiConfig>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = find_mut(&mut sessions, session_id)?;
        session.config = config;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, session_id: &str) -> Option<ChatSession> {
        let sessions = self.sessions.read().await;
        sessions.iter().find(|s| s.id == session_id).cloned()
    }

    async fn list_sessions(&self) -> Vec<ChatSession> {
        self.sessions.read().await.clone()
    }

    async fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            let session = find_mut(&mut sessions, session_id)?;
            session.last_message_at = message.timestamp;
            session.messages.push(message.clone());
        }
        // Nobody listening is fine; display layers come and go.
        let _ = self.events.send(message);
        Ok(())
    }

    async fn set_auto_flag(&self, session_id: &str, enabled: bool) {
        self.auto_flags
            .write()
            .await
            .insert(session_id.to_string(), enabled);
    }

    async fn auto_flag(&self, session_id: &str) -> bool {
        self.auto_flags
            .read()
            .await
            .get(session_id)
            .copied()
            .unwrap_or(false)
    }

    async fn first_auto_session(&self) -> Option<String> {
        let flags = self.auto_flags.read().await;
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .find(|s| flags.get(&s.id).copied().unwrap_or(false) && !s.messages.is_empty())
            .map(|s| s.id.clone())
    }

    async fn clear_history(&self, session_id: &str) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            let session = find_mut(&mut sessions, session_id)?;
            session.messages.clear();
        }
        self.auto_flags
            .write()
            .await
            .insert(session_id.to_string(), false);
        Ok(())
    }
}

fn find_mut<'a>(
    sessions: &'a mut Vec<ChatSession>,
    session_id: &str,
) -> Result<&'a mut ChatSession> {
    sessions
        .iter_mut()
        .find(|s| s.id == session_id)
        .ok_or_else(|| SalonError::not_found("session", session_id))
}
