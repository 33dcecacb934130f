//! Orchestration layer for Salon: the turn scheduler, the single-flight
//! typing slot, the speaker-engine seam, and the auto-continuation poller.

pub mod engine;
pub mod poller;
pub mod scheduler;
pub mod typing;

pub use engine::{ApiSpeakerEngine, SpeakerEngine};
pub use poller::{AutoContinuationPoller, PollerHandle};
pub use scheduler::{SkipReason, TurnOutcome, TurnScheduler};
pub use typing::{TypingSlot, TypingState};
