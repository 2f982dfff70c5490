//! Session storage
//!
//! One live state per user. The default store is process memory: sessions
//! are deliberately lost on restart, so users resume from a clean slate.

use super::SessionState;
use std::collections::HashMap;
use std::sync::Mutex;

/// Where per-user conversation state lives between turns.
pub trait SessionStore: Send + Sync {
    /// Current state for a user; `Neutral` if none was stored.
    fn load(&self, user_id: i64) -> SessionState;
    fn store(&self, user_id: i64, state: SessionState);
    fn clear(&self, user_id: i64);
}

/// In-process store backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<i64, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, user_id: i64) -> SessionState {
        self.sessions
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or(SessionState::Neutral)
    }

    fn store(&self, user_id: i64, state: SessionState) {
        if state.is_neutral() {
            // neutral is the absence of a session, not a session to keep
            self.sessions.lock().unwrap().remove(&user_id);
            return;
        }
        self.sessions.lock().unwrap().insert(user_id, state);
    }

    fn clear(&self, user_id: i64) {
        self.sessions.lock().unwrap().remove(&user_id);
    }
}
