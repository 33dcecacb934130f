//! Persona domain model.
//!
//! Represents the identities that participate in conversations: the human
//! user and the AI-driven characters. Each AI persona carries a behavioral
//! prompt that fixes its voice.

use serde::{Deserialize, Serialize};

/// A conversational identity participating in chat sessions.
///
/// Personas are owned by a registry external to the turn-taking core; the
/// core only ever reads them by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique identifier
    pub id: String,
    /// Display name shown in transcripts and used for mention detection
    pub name: String,
    /// Short role blurb, shown to the moderator when picking a speaker
    pub description: String,
    /// Behavioral prompt embedded into the system instruction
    pub system_instruction: String,
    /// True for the human participant
    #[serde(default)]
    pub is_human: bool,
    /// Optional model override for this persona's replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Persona {
    /// Creates the human participant. Humans carry no behavioral prompt.
    pub fn human(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            system_instruction: String::new(),
            is_human: true,
            model: None,
        }
    }

    /// Creates an AI persona with a role blurb and behavioral prompt.
    pub fn ai(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            system_instruction: system_instruction.into(),
            is_human: false,
            model: None,
        }
    }

    /// Pins this persona's replies to a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// First whitespace-separated token of the display name, used for
    /// `@first-name` mention detection.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_splits_on_whitespace() {
        let persona = Persona::ai("p1", "Ada Lovelace", "mathematician", "You are Ada.");
        assert_eq!(persona.first_name(), "Ada");
    }

    #[test]
    fn test_first_name_of_single_token_name() {
        let persona = Persona::ai("p2", "Socrates", "philosopher", "You are Socrates.");
        assert_eq!(persona.first_name(), "Socrates");
    }

    #[test]
    fn test_human_constructor() {
        let me = Persona::human("user-me", "Me");
        assert!(me.is_human);
        assert!(me.model.is_none());
    }
}
