//! Events that drive a conversation forward

use crate::fields::FieldKey;

/// One turn's worth of user input, already parsed by the command layer.
#[derive(Debug, Clone)]
pub enum Event {
    /// Begin the filter-creation sequence.
    StartFilter,
    /// Begin the listing-creation sequence. The contact field is filled from
    /// the sender identity rather than asked.
    StartListing { contact: String },
    /// Begin the single-field update flow for an existing filter.
    StartUpdate { filter_id: i64 },
    /// The field the user picked during the update flow.
    FieldChoice { field: FieldKey },
    /// A free-text answer to the current prompt.
    Text { raw: String },
    /// One photo for the listing draft.
    Photo { data: Vec<u8> },
    /// Stop uploading photos and commit the listing.
    FinishPhotos,
    /// Abandon whatever is in flight.
    Cancel,
}

impl Event {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StartFilter => "start_filter",
            Event::StartListing { .. } => "start_listing",
            Event::StartUpdate { .. } => "start_update",
            Event::FieldChoice { .. } => "field_choice",
            Event::Text { .. } => "text",
            Event::Photo { .. } => "photo",
            Event::FinishPhotos => "finish_photos",
            Event::Cancel => "cancel",
        }
    }
}
