//! HTTP surface: webhook intake plus the admin/data REST endpoints.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::bot::{ChatTransport, Dispatcher};
use crate::db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub transport: Arc<dyn ChatTransport>,
}

impl AppState {
    pub fn new(db: Database, dispatcher: Dispatcher, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            db,
            dispatcher,
            transport,
        }
    }
}
