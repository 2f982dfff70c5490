//! Conversation engine
//!
//! Thin wrapper around the pure transition function: loads the user's
//! session, applies the event, stores the result. Listing creation is
//! gated on the publisher authorization seam before the start transition
//! runs, so an unauthorized attempt never leaves a session behind.

use super::{transition, Event, SessionState, SessionStore, Step, TransitionError};
use crate::db::Database;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Who may publish listings.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can_publish(&self, user_id: i64) -> bool;
}

/// Admins are the publishers. A storage failure reads as "no".
#[async_trait]
impl Authorizer for Database {
    async fn can_publish(&self, user_id: i64) -> bool {
        match self.is_admin(user_id) {
            Ok(flag) => flag,
            Err(error) => {
                warn!(user_id, %error, "admin lookup failed, denying publish");
                false
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user is not authorized to publish listings")]
    Unauthorized,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// How to begin a conversation.
#[derive(Debug, Clone)]
pub enum StartRequest {
    Filter,
    Listing { contact: String },
    Update { filter_id: i64 },
}

pub struct ConversationEngine {
    sessions: Arc<dyn SessionStore>,
    authorizer: Arc<dyn Authorizer>,
}

impl ConversationEngine {
    pub fn new(sessions: Arc<dyn SessionStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            sessions,
            authorizer,
        }
    }

    /// Begin a conversation, replacing any session already in flight.
    pub async fn start(&self, user_id: i64, request: StartRequest) -> Result<Step, EngineError> {
        let event = match request {
            StartRequest::Filter => Event::StartFilter,
            StartRequest::Listing { contact } => Event::StartListing { contact },
            StartRequest::Update { filter_id } => Event::StartUpdate { filter_id },
        };
        self.submit(user_id, event).await
    }

    /// Apply one event to the user's session. On error the stored state is
    /// untouched, so the caller simply re-prompts.
    pub async fn submit(&self, user_id: i64, event: Event) -> Result<Step, EngineError> {
        if matches!(event, Event::StartListing { .. })
            && !self.authorizer.can_publish(user_id).await
        {
            return Err(EngineError::Unauthorized);
        }

        let current = self.sessions.load(user_id);
        let step = transition(&current, event)?;
        self.sessions.store(user_id, step.state.clone());
        Ok(step)
    }

    /// Unconditional cancel: collected values are discarded.
    pub fn cancel(&self, user_id: i64) -> Step {
        self.sessions.clear(user_id);
        Step {
            state: SessionState::Neutral,
            output: super::StepOutput::Cancelled,
        }
    }

    /// Peek at the current session without advancing it.
    pub fn current_state(&self, user_id: i64) -> SessionState {
        self.sessions.load(user_id)
    }
}
