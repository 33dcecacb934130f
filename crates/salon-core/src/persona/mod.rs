//! Personas: the identities participating in chat sessions.

pub mod model;
pub mod registry;

pub use model::Persona;
pub use registry::{InMemoryPersonaRegistry, PersonaRegistry};
