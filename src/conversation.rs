//! Per-user finite-state conversation engine.
//!
//! The transition function is pure; the engine layers session storage and
//! publisher authorization on top of it. Multi-turn flows: filter creation,
//! single-field filter update, listing creation with a photo phase.

mod engine;
mod event;
mod session;
mod state;
mod transition;

pub use engine::{Authorizer, ConversationEngine, EngineError, StartRequest};
pub use event::Event;
pub use session::{InMemorySessionStore, SessionStore};
pub use state::{ConversationKind, SessionState};
pub use transition::{transition, Step, StepOutput, TransitionError};
