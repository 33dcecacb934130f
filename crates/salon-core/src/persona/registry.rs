//! Persona registry.
//!
//! The turn-taking core resolves personas by id through the read-only
//! [`PersonaRegistry`] trait. Management operations (create, delete) live on
//! the concrete in-memory implementation used by the front-end.

use super::model::Persona;
use crate::error::{Result, SalonError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Read-only lookup of personas, as seen by the scheduler.
#[async_trait]
pub trait PersonaRegistry: Send + Sync {
    /// Returns the persona with the given id, if registered.
    async fn get(&self, id: &str) -> Option<Persona>;

    /// Returns all registered personas in registration order.
    async fn list(&self) -> Vec<Persona>;
}

/// In-memory registry, insertion-ordered.
#[derive(Default)]
pub struct InMemoryPersonaRegistry {
    personas: RwLock<Vec<Persona>>,
}

impl InMemoryPersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_personas(personas: Vec<Persona>) -> Self {
        Self {
            personas: RwLock::new(personas),
        }
    }

    /// Adds a persona, replacing any existing one with the same id.
    pub async fn insert(&self, persona: Persona) {
        let mut personas = self.personas.write().await;
        if let Some(existing) = personas.iter_mut().find(|p| p.id == persona.id) {
            *existing = persona;
        } else {
            personas.push(persona);
        }
    }

    /// Removes a persona by id.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut personas = self.personas.write().await;
        let before = personas.len();
        personas.retain(|p| p.id != id);
        if personas.len() == before {
            return Err(SalonError::not_found("persona", id));
        }
        Ok(())
    }
}

#[async_trait]
impl PersonaRegistry for InMemoryPersonaRegistry {
    async fn get(&self, id: &str) -> Option<Persona> {
        let personas = self.personas.read().await;
        personas.iter().find(|p| p.id == id).cloned()
    }

    async fn list(&self) -> Vec<Persona> {
        self.personas.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = InMemoryPersonaRegistry::new();
        registry
            .insert(Persona::ai("p1", "Ada", "mathematician", "You are Ada."))
            .await;

        let found = registry.get("p1").await;
        assert_eq!(found.map(|p| p.name), Some("Ada".to_string()));
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_same_id() {
        let registry = InMemoryPersonaRegistry::new();
        registry
            .insert(Persona::ai("p1", "Ada", "mathematician", "You are Ada."))
            .await;
        registry
            .insert(Persona::ai("p1", "Ada L.", "engineer", "You are Ada."))
            .await;

        let personas = registry.list().await;
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].name, "Ada L.");
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let registry = InMemoryPersonaRegistry::new();
        let err = registry.remove("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
