//! Per-user conversation state

use crate::db::NewListing;
use crate::fields::{CollectedFields, FieldDescriptor, FieldKey, FILTER_CREATE, LISTING_CREATE};
use serde::{Deserialize, Serialize};

/// Which multi-step data-entry sequence is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    FilterCreate,
    ListingCreate,
}

impl ConversationKind {
    pub fn schema(self) -> &'static [FieldDescriptor] {
        match self {
            ConversationKind::FilterCreate => FILTER_CREATE,
            ConversationKind::ListingCreate => LISTING_CREATE,
        }
    }
}

/// Where one user currently is. Exactly one state per user; starting a new
/// conversation replaces whatever was in flight. Held in process memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No conversation in flight.
    Neutral,
    /// Walking a creation schema, one field per turn.
    Collecting {
        kind: ConversationKind,
        /// Index into the schema of the field currently being asked.
        cursor: usize,
        collected: CollectedFields,
    },
    /// Filter update: waiting for the user to pick which field to change.
    ChoosingField { filter_id: i64 },
    /// Filter update: waiting for the new value of one field.
    EditingField { filter_id: i64, field: FieldKey },
    /// Listing fields are done; accumulating photos for the draft.
    CollectingPhotos {
        draft: NewListing,
        photos: Vec<Vec<u8>>,
    },
}

impl SessionState {
    pub fn is_neutral(&self) -> bool {
        matches!(self, SessionState::Neutral)
    }
}
