//! The single-flight typing slot.
//!
//! One generation pipeline may run at any instant, system-wide. The slot is
//! an explicit token: `Option<TypingState>` behind a mutex, acquired with a
//! check-then-set and released by an RAII guard, so no code path can leak it.

use std::sync::{Arc, Mutex, MutexGuard};

/// Who is generating, and for which session.
///
/// `persona_id` is `None` between slot acquisition and speaker selection;
/// the typing indicator only shows once a persona is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingState {
    pub session_id: String,
    pub persona_id: Option<String>,
}

/// Process-wide single slot shared by all sessions.
#[derive(Clone, Default)]
pub struct TypingSlot {
    inner: Arc<Mutex<Option<TypingState>>>,
}

impl TypingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for a session. Returns `None` when a generation is
    /// already in flight anywhere.
    pub fn try_acquire(&self, session_id: &str) -> Option<FlightGuard> {
        let mut slot = lock(&self.inner);
        if slot.is_some() {
            return None;
        }
        *slot = Some(TypingState {
            session_id: session_id.to_string(),
            persona_id: None,
        });
        Some(FlightGuard {
            slot: Arc::clone(&self.inner),
        })
    }

    /// Whether a generation is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// The `(session_id, persona_id)` currently visible as typing, if a
    /// speaker has been selected.
    pub fn typing(&self) -> Option<(String, String)> {
        lock(&self.inner).as_ref().and_then(|state| {
            state
                .persona_id
                .clone()
                .map(|persona| (state.session_id.clone(), persona))
        })
    }
}

/// RAII release: dropping the guard clears the slot and the typing state on
/// every exit path, success or failure.
pub struct FlightGuard {
    slot: Arc<Mutex<Option<TypingState>>>,
}

impl FlightGuard {
    /// Marks the selected persona as typing.
    pub fn set_typing(&self, persona_id: &str) {
        if let Some(state) = lock(&self.slot).as_mut() {
            state.persona_id = Some(persona_id.to_string());
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.slot).take();
    }
}

fn lock(mutex: &Mutex<Option<TypingState>>) -> MutexGuard<'_, Option<TypingState>> {
    // A poisoned slot would wedge the whole scheduler; recover the inner
    // value instead.
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let slot = TypingSlot::new();
        let guard = slot.try_acquire("s1");
        assert!(guard.is_some());
        assert!(slot.try_acquire("s2").is_none());
    }

    #[test]
    fn test_drop_releases_the_slot() {
        let slot = TypingSlot::new();
        {
            let _guard = slot.try_acquire("s1").unwrap();
            assert!(slot.is_busy());
        }
        assert!(!slot.is_busy());
        assert!(slot.try_acquire("s2").is_some());
    }

    #[test]
    fn test_typing_requires_a_selected_persona() {
        let slot = TypingSlot::new();
        let guard = slot.try_acquire("s1").unwrap();
        assert_eq!(slot.typing(), None);

        guard.set_typing("ai-ada");
        assert_eq!(slot.typing(), Some(("s1".to_string(), "ai-ada".to_string())));

        drop(guard);
        assert_eq!(slot.typing(), None);
    }
}
