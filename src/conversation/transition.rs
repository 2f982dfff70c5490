//! Pure state transition function
//!
//! Given the current session state and one event, produce the next state and
//! a typed output for the caller to render. No I/O happens here; validation
//! failures are errors and leave the caller's stored state untouched, so the
//! same field is simply asked again.

use super::{ConversationKind, Event, SessionState};
use crate::db::{IncompleteDraft, NewListing};
use crate::fields::{
    coerce, update_descriptor, FieldDescriptor, FieldInput, FieldKey, FieldValue, ValidationError,
    MAX_PHOTOS,
};
use thiserror::Error;

/// Result of one transition: the state to store plus what to tell the user
/// or hand to the completion handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: SessionState,
    pub output: StepOutput,
}

impl Step {
    fn new(state: SessionState, output: StepOutput) -> Self {
        Self { state, output }
    }
}

/// Typed transition output.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Ask the user for the named field.
    Prompt(&'static FieldDescriptor),
    /// Ask the user which filter field to edit.
    ChooseField { filter_id: i64 },
    /// Continue (or begin) the photo phase; `count` photos are held so far.
    AwaitPhotos { count: usize },
    /// Filter creation confirmed; the collected values are ready to persist.
    FilterComplete {
        collected: crate::fields::CollectedFields,
    },
    /// One filter field edited; ready to apply. `None` clears the column.
    UpdateComplete {
        filter_id: i64,
        field: FieldKey,
        value: Option<FieldValue>,
    },
    /// Listing draft plus photos, committed together.
    ListingComplete {
        draft: NewListing,
        photos: Vec<Vec<u8>>,
    },
    /// The user declined the confirmation; nothing was saved.
    Discarded,
    /// The user cancelled; nothing was saved.
    Cancelled,
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("{0} cannot be edited on a filter")]
    NotAFilterField(FieldKey),
    #[error(transparent)]
    IncompleteDraft(#[from] IncompleteDraft),
}

/// Pure transition function.
///
/// Start events and Cancel are accepted from any state; a new conversation
/// silently discards whatever was in flight.
pub fn transition(state: &SessionState, event: Event) -> Result<Step, TransitionError> {
    match (state, event) {
        // ============================================================
        // Universal events: start and cancel work from anywhere
        // ============================================================
        (_, Event::Cancel) => Ok(Step::new(SessionState::Neutral, StepOutput::Cancelled)),

        (_, Event::StartFilter) => {
            let schema = ConversationKind::FilterCreate.schema();
            Ok(Step::new(
                SessionState::Collecting {
                    kind: ConversationKind::FilterCreate,
                    cursor: 0,
                    collected: Default::default(),
                },
                StepOutput::Prompt(&schema[0]),
            ))
        }

        (_, Event::StartListing { contact }) => {
            let schema = ConversationKind::ListingCreate.schema();
            let mut collected = crate::fields::CollectedFields::default();
            // contact comes from the sender identity, so the first asked
            // field is the one after it
            collected.insert(FieldKey::Contact, Some(FieldValue::Text(contact)));
            Ok(Step::new(
                SessionState::Collecting {
                    kind: ConversationKind::ListingCreate,
                    cursor: 1,
                    collected,
                },
                StepOutput::Prompt(&schema[1]),
            ))
        }

        (_, Event::StartUpdate { filter_id }) => Ok(Step::new(
            SessionState::ChoosingField { filter_id },
            StepOutput::ChooseField { filter_id },
        )),

        // ============================================================
        // Schema walk: one field per text turn
        // ============================================================
        (
            SessionState::Collecting {
                kind,
                cursor,
                collected,
            },
            Event::Text { raw },
        ) => {
            let schema = kind.schema();
            let desc = &schema[*cursor];

            if desc.key == FieldKey::Confirmation {
                return match coerce(desc, &raw)? {
                    FieldInput::Value(FieldValue::Bool(true)) => Ok(Step::new(
                        SessionState::Neutral,
                        StepOutput::FilterComplete {
                            collected: collected.clone(),
                        },
                    )),
                    _ => Ok(Step::new(SessionState::Neutral, StepOutput::Discarded)),
                };
            }

            let input = coerce(desc, &raw)?;
            let mut collected = collected.clone();
            collected.insert(desc.key, input.into_option());
            let next = cursor + 1;

            if next == schema.len() {
                // only the listing schema runs off the end; filters close
                // with the confirmation step above
                let draft = NewListing::from_collected(&collected)?;
                return Ok(Step::new(
                    SessionState::CollectingPhotos {
                        draft,
                        photos: vec![],
                    },
                    StepOutput::AwaitPhotos { count: 0 },
                ));
            }

            Ok(Step::new(
                SessionState::Collecting {
                    kind: *kind,
                    cursor: next,
                    collected,
                },
                StepOutput::Prompt(&schema[next]),
            ))
        }

        // ============================================================
        // Filter update: pick a field, then supply its new value
        // ============================================================
        (SessionState::ChoosingField { filter_id }, Event::FieldChoice { field }) => {
            let desc =
                update_descriptor(field).ok_or(TransitionError::NotAFilterField(field))?;
            Ok(Step::new(
                SessionState::EditingField {
                    filter_id: *filter_id,
                    field,
                },
                StepOutput::Prompt(desc),
            ))
        }

        (SessionState::EditingField { filter_id, field }, Event::Text { raw }) => {
            let desc =
                update_descriptor(*field).ok_or(TransitionError::NotAFilterField(*field))?;
            let input = coerce(desc, &raw)?;
            Ok(Step::new(
                SessionState::Neutral,
                StepOutput::UpdateComplete {
                    filter_id: *filter_id,
                    field: *field,
                    value: input.into_option(),
                },
            ))
        }

        // ============================================================
        // Photo phase: accumulate up to the cap, then commit as one unit
        // ============================================================
        (SessionState::CollectingPhotos { draft, photos }, Event::Photo { data }) => {
            let mut photos = photos.clone();
            photos.push(data);
            if photos.len() >= MAX_PHOTOS {
                return Ok(Step::new(
                    SessionState::Neutral,
                    StepOutput::ListingComplete {
                        draft: draft.clone(),
                        photos,
                    },
                ));
            }
            let count = photos.len();
            Ok(Step::new(
                SessionState::CollectingPhotos {
                    draft: draft.clone(),
                    photos,
                },
                StepOutput::AwaitPhotos { count },
            ))
        }

        (SessionState::CollectingPhotos { draft, photos }, Event::FinishPhotos) => Ok(Step::new(
            SessionState::Neutral,
            StepOutput::ListingComplete {
                draft: draft.clone(),
                photos: photos.clone(),
            },
        )),

        // Everything else does not fit the current state
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} event in {} state",
            event.kind(),
            state_name(state)
        ))),
    }
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Neutral => "neutral",
        SessionState::Collecting { .. } => "collecting",
        SessionState::ChoosingField { .. } => "choosing_field",
        SessionState::EditingField { .. } => "editing_field",
        SessionState::CollectingPhotos { .. } => "collecting_photos",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FILTER_CREATE, LISTING_CREATE};

    fn text(raw: &str) -> Event {
        Event::Text {
            raw: raw.to_string(),
        }
    }

    /// Drive a state through one event, panicking on error.
    fn step(state: &SessionState, event: Event) -> Step {
        transition(state, event).unwrap()
    }

    #[test]
    fn filter_walkthrough_collects_every_answer() {
        let mut step_result = step(&SessionState::Neutral, Event::StartFilter);
        assert!(matches!(
            step_result.output,
            StepOutput::Prompt(d) if d.key == FieldKey::Name
        ));

        // answer every field up to the confirmation, skipping some
        let answers = [
            "downtown",  // name
            "apartment", // property_type
            "rent",      // deal_type
            "Moscow",    // city
            "Arbat, Tverskoy", // areas
            "500",       // min_price
            "2000",      // max_price
            "-",         // min_rooms
            "3",         // max_rooms
            "-",         // min_total_area
            "-",         // max_total_area
            "yes",       // balcony
            "-",         // renovated
            "-",         // min_deposit
            "-",         // max_deposit
            "-",         // floor
            "-",         // is_active
            "-",         // total_floors
        ];
        for answer in answers {
            step_result = step(&step_result.state, text(answer));
        }

        // now at the confirmation step
        assert!(matches!(
            step_result.output,
            StepOutput::Prompt(d) if d.key == FieldKey::Confirmation
        ));

        let done = step(&step_result.state, text("yes"));
        assert!(done.state.is_neutral());
        let StepOutput::FilterComplete { collected } = done.output else {
            panic!("expected completion, got {:?}", done.output);
        };
        assert_eq!(
            collected.get(&FieldKey::City),
            Some(&Some(FieldValue::Text("Moscow".to_string())))
        );
        assert_eq!(collected.get(&FieldKey::MinRooms), Some(&None));
        assert_eq!(
            collected.get(&FieldKey::Balcony),
            Some(&Some(FieldValue::Bool(true)))
        );
        assert_eq!(
            collected.get(&FieldKey::Areas),
            Some(&Some(FieldValue::TextSet(vec![
                "Arbat".to_string(),
                "Tverskoy".to_string()
            ])))
        );
    }

    #[test]
    fn declined_confirmation_discards_the_draft() {
        let mut s = step(&SessionState::Neutral, Event::StartFilter);
        for _ in 0..FILTER_CREATE.len() - 1 {
            s = step(&s.state, text("-"));
        }
        let done = step(&s.state, text("no"));
        assert!(done.state.is_neutral());
        assert_eq!(done.output, StepOutput::Discarded);
    }

    #[test]
    fn validation_failure_does_not_advance() {
        let started = step(&SessionState::Neutral, Event::StartFilter);
        // advance to min_price
        let mut s = started;
        while !matches!(s.output, StepOutput::Prompt(d) if d.key == FieldKey::MinPrice) {
            s = step(&s.state, text("-"));
        }

        let err = transition(&s.state, text("cheap")).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Validation(ValidationError::NotANumber {
                field: FieldKey::MinPrice
            })
        ));

        // the same state accepts a corrected answer
        let next = step(&s.state, text("750"));
        assert!(matches!(
            next.output,
            StepOutput::Prompt(d) if d.key == FieldKey::MaxPrice
        ));
    }

    #[test]
    fn choice_field_rejects_unknown_vocabulary() {
        let s = step(&SessionState::Neutral, Event::StartFilter);
        let s = step(&s.state, text("my filter"));
        let err = transition(&s.state, text("castle")).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Validation(ValidationError::NotAChoice { .. })
        ));
    }

    #[test]
    fn listing_walkthrough_ends_in_photo_phase() {
        let mut s = step(
            &SessionState::Neutral,
            Event::StartListing {
                contact: "@seller".to_string(),
            },
        );
        // contact was auto-filled, so the first prompt is property_type
        assert!(matches!(
            s.output,
            StepOutput::Prompt(d) if d.key == FieldKey::PropertyType
        ));

        let answers = [
            "apartment", "rent", "1200", "Moscow", "Arbat", "-", "-", "-", "2", "yes", "-", "54",
            "3", "9", "1200", "Nice flat",
        ];
        assert_eq!(answers.len(), LISTING_CREATE.len() - 1);
        for answer in answers {
            s = step(&s.state, text(answer));
        }

        assert_eq!(s.output, StepOutput::AwaitPhotos { count: 0 });
        let SessionState::CollectingPhotos { draft, photos } = &s.state else {
            panic!("expected photo phase, got {:?}", s.state);
        };
        assert!(photos.is_empty());
        assert_eq!(draft.contact, "@seller");
        assert_eq!(draft.price, 1200);
        assert_eq!(draft.rooms, Some(2));
        assert_eq!(draft.street, None);
    }

    #[test]
    fn finish_commits_listing_with_accumulated_photos() {
        let draft = NewListing {
            contact: "@seller".to_string(),
            property_type: "apartment".to_string(),
            deal_type: "rent".to_string(),
            price: 900,
            city: None,
            area: None,
            street: None,
            house_number: None,
            apartment_number: None,
            rooms: None,
            balcony: None,
            renovated: None,
            total_area: None,
            floor: None,
            total_floors: None,
            deposit: None,
            description: None,
        };
        let state = SessionState::CollectingPhotos {
            draft,
            photos: vec![],
        };

        let s = step(&state, Event::Photo { data: vec![1] });
        assert_eq!(s.output, StepOutput::AwaitPhotos { count: 1 });
        let s = step(&s.state, Event::Photo { data: vec![2] });
        let done = step(&s.state, Event::FinishPhotos);
        assert!(done.state.is_neutral());
        let StepOutput::ListingComplete { photos, .. } = done.output else {
            panic!("expected completion");
        };
        assert_eq!(photos.len(), 2);
    }

    #[test]
    fn photo_phase_caps_at_the_limit() {
        let draft = NewListing {
            contact: "@seller".to_string(),
            property_type: "house".to_string(),
            deal_type: "sale".to_string(),
            price: 100_000,
            city: None,
            area: None,
            street: None,
            house_number: None,
            apartment_number: None,
            rooms: None,
            balcony: None,
            renovated: None,
            total_area: None,
            floor: None,
            total_floors: None,
            deposit: None,
            description: None,
        };
        let mut s = Step {
            state: SessionState::CollectingPhotos {
                draft,
                photos: vec![],
            },
            output: StepOutput::AwaitPhotos { count: 0 },
        };
        for i in 0..MAX_PHOTOS {
            s = step(&s.state, Event::Photo { data: vec![i as u8] });
        }
        // the cap-hitting photo completes without an explicit finish
        let StepOutput::ListingComplete { photos, .. } = s.output else {
            panic!("expected completion at the photo cap");
        };
        assert_eq!(photos.len(), MAX_PHOTOS);
    }

    #[test]
    fn update_flow_applies_one_field_without_confirmation() {
        let s = step(&SessionState::Neutral, Event::StartUpdate { filter_id: 9 });
        assert_eq!(s.output, StepOutput::ChooseField { filter_id: 9 });

        let s = step(
            &s.state,
            Event::FieldChoice {
                field: FieldKey::MaxPrice,
            },
        );
        assert!(matches!(
            s.output,
            StepOutput::Prompt(d) if d.key == FieldKey::MaxPrice
        ));

        let done = step(&s.state, text("2500"));
        assert!(done.state.is_neutral());
        assert_eq!(
            done.output,
            StepOutput::UpdateComplete {
                filter_id: 9,
                field: FieldKey::MaxPrice,
                value: Some(FieldValue::Int(2500)),
            }
        );
    }

    #[test]
    fn update_with_sentinel_clears_the_field() {
        let state = SessionState::EditingField {
            filter_id: 4,
            field: FieldKey::City,
        };
        let done = step(&state, text("-"));
        assert_eq!(
            done.output,
            StepOutput::UpdateComplete {
                filter_id: 4,
                field: FieldKey::City,
                value: None,
            }
        );
    }

    #[test]
    fn confirmation_cannot_be_chosen_for_update() {
        let state = SessionState::ChoosingField { filter_id: 4 };
        let err = transition(
            &state,
            Event::FieldChoice {
                field: FieldKey::Confirmation,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::NotAFilterField(FieldKey::Confirmation)
        ));
    }

    #[test]
    fn cancel_discards_from_any_state() {
        let mid_filter = step(&SessionState::Neutral, Event::StartFilter);
        let cancelled = step(&mid_filter.state, Event::Cancel);
        assert!(cancelled.state.is_neutral());
        assert_eq!(cancelled.output, StepOutput::Cancelled);

        let cancelled = step(&SessionState::Neutral, Event::Cancel);
        assert!(cancelled.state.is_neutral());
    }

    #[test]
    fn starting_a_new_conversation_replaces_the_old_one() {
        let mid_filter = step(&SessionState::Neutral, Event::StartFilter);
        let answered = step(&mid_filter.state, text("old name"));

        let restarted = step(&answered.state, Event::StartFilter);
        let SessionState::Collecting {
            cursor, collected, ..
        } = &restarted.state
        else {
            panic!("expected fresh collection");
        };
        assert_eq!(*cursor, 0);
        assert!(collected.is_empty());
    }

    #[test]
    fn stray_events_are_invalid_transitions() {
        let err = transition(&SessionState::Neutral, text("hello")).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));

        let err = transition(&SessionState::Neutral, Event::FinishPhotos).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));

        let mid_filter = step(&SessionState::Neutral, Event::StartFilter);
        let err = transition(&mid_filter.state, Event::Photo { data: vec![0] }).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }
}
