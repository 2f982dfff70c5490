//! Field schemas for the data-entry conversations.
//!
//! Each conversation walks an ordered, immutable sequence of field
//! descriptors. A descriptor knows its key, semantic type, prompt text and
//! (for choice fields) the allowed vocabulary. Raw user tokens are coerced
//! into a three-valued result: explicitly absent, a typed value, or a
//! validation error that leaves the conversation on the same field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved input token meaning "no preference" for a field.
pub const SENTINEL: &str = "-";

/// Upper bound on photos attached to a single listing.
pub const MAX_PHOTOS: usize = 10;

/// Discriminated identifier for every field the conversations can collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    // Filter fields
    Name,
    PropertyType,
    DealType,
    City,
    Areas,
    MinPrice,
    MaxPrice,
    MinRooms,
    MaxRooms,
    MinTotalArea,
    MaxTotalArea,
    Balcony,
    Renovated,
    MinDeposit,
    MaxDeposit,
    Floor,
    IsActive,
    TotalFloors,
    Confirmation,
    // Listing-only fields
    Contact,
    Price,
    Area,
    Street,
    HouseNumber,
    ApartmentNumber,
    Rooms,
    TotalArea,
    Deposit,
    Description,
}

impl FieldKey {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::PropertyType => "property_type",
            FieldKey::DealType => "deal_type",
            FieldKey::City => "city",
            FieldKey::Areas => "areas",
            FieldKey::MinPrice => "min_price",
            FieldKey::MaxPrice => "max_price",
            FieldKey::MinRooms => "min_rooms",
            FieldKey::MaxRooms => "max_rooms",
            FieldKey::MinTotalArea => "min_total_area",
            FieldKey::MaxTotalArea => "max_total_area",
            FieldKey::Balcony => "balcony",
            FieldKey::Renovated => "renovated",
            FieldKey::MinDeposit => "min_deposit",
            FieldKey::MaxDeposit => "max_deposit",
            FieldKey::Floor => "floor",
            FieldKey::IsActive => "is_active",
            FieldKey::TotalFloors => "total_floors",
            FieldKey::Confirmation => "confirmation",
            FieldKey::Contact => "contact",
            FieldKey::Price => "price",
            FieldKey::Area => "area",
            FieldKey::Street => "street",
            FieldKey::HouseNumber => "house_number",
            FieldKey::ApartmentNumber => "apartment_number",
            FieldKey::Rooms => "rooms",
            FieldKey::TotalArea => "total_area",
            FieldKey::Deposit => "deposit",
            FieldKey::Description => "description",
        }
    }

    /// Whether this key addresses a column of the filters table that the
    /// update conversation may edit.
    pub fn is_editable_filter_field(self) -> bool {
        update_descriptor(self).is_some()
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "name" => FieldKey::Name,
            "property_type" => FieldKey::PropertyType,
            "deal_type" => FieldKey::DealType,
            "city" => FieldKey::City,
            "areas" => FieldKey::Areas,
            "min_price" => FieldKey::MinPrice,
            "max_price" => FieldKey::MaxPrice,
            "min_rooms" => FieldKey::MinRooms,
            "max_rooms" => FieldKey::MaxRooms,
            "min_total_area" => FieldKey::MinTotalArea,
            "max_total_area" => FieldKey::MaxTotalArea,
            "balcony" => FieldKey::Balcony,
            "renovated" => FieldKey::Renovated,
            "min_deposit" => FieldKey::MinDeposit,
            "max_deposit" => FieldKey::MaxDeposit,
            "floor" => FieldKey::Floor,
            "is_active" => FieldKey::IsActive,
            "total_floors" => FieldKey::TotalFloors,
            "confirmation" => FieldKey::Confirmation,
            "contact" => FieldKey::Contact,
            "price" => FieldKey::Price,
            "area" => FieldKey::Area,
            "street" => FieldKey::Street,
            "house_number" => FieldKey::HouseNumber,
            "apartment_number" => FieldKey::ApartmentNumber,
            "rooms" => FieldKey::Rooms,
            "total_area" => FieldKey::TotalArea,
            "deposit" => FieldKey::Deposit,
            "description" => FieldKey::Description,
            _ => return Err(UnknownFieldError(s.to_string())),
        };
        Ok(key)
    }
}

#[derive(Debug, Error)]
#[error("unknown field: {0}")]
pub struct UnknownFieldError(pub String);

/// Semantic type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Boolean,
    /// Comma-separated set of strings, elements trimmed.
    TextSet,
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Bool(bool),
    TextSet(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text_set(&self) -> Option<&[String]> {
        match self {
            FieldValue::TextSet(v) => Some(v),
            _ => None,
        }
    }
}

/// Result of coercing one raw token: the user either declined the field or
/// supplied a typed value. Invalid input is the error side of [`coerce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    /// The sentinel was submitted: explicitly "no preference".
    Absent,
    Value(FieldValue),
}

impl FieldInput {
    pub fn into_option(self) -> Option<FieldValue> {
        match self {
            FieldInput::Absent => None,
            FieldInput::Value(v) => Some(v),
        }
    }
}

/// Values collected so far in a conversation, keyed by field. `None` means
/// the user explicitly declined the field with the sentinel.
pub type CollectedFields = std::collections::BTreeMap<FieldKey, Option<FieldValue>>;

/// Static description of one step in a conversation.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub key: FieldKey,
    pub field_type: FieldType,
    pub prompt: &'static str,
    /// Allowed vocabulary for choice fields.
    pub choices: Option<&'static [&'static str]>,
    /// Whether the sentinel token is accepted for this field.
    pub optional: bool,
}

const PROPERTY_TYPES: &[&str] = &["apartment", "house", "room", "land", "commercial"];
const DEAL_TYPES: &[&str] = &["rent", "sale"];

const fn field(
    key: FieldKey,
    field_type: FieldType,
    prompt: &'static str,
    choices: Option<&'static [&'static str]>,
    optional: bool,
) -> FieldDescriptor {
    FieldDescriptor {
        key,
        field_type,
        prompt,
        choices,
        optional,
    }
}

/// Filter-creation sequence, ending in a terminal confirmation step.
pub static FILTER_CREATE: &[FieldDescriptor] = &[
    field(FieldKey::Name, FieldType::Text, "Enter a name for the filter", None, true),
    field(
        FieldKey::PropertyType,
        FieldType::Text,
        "Choose a property type (apartment, house, room, land, commercial), or - for any",
        Some(PROPERTY_TYPES),
        true,
    ),
    field(
        FieldKey::DealType,
        FieldType::Text,
        "Choose a deal type (rent, sale), or - for any",
        Some(DEAL_TYPES),
        true,
    ),
    field(FieldKey::City, FieldType::Text, "Enter a city, or - for any", None, true),
    field(
        FieldKey::Areas,
        FieldType::TextSet,
        "Enter districts separated by commas (District1, District2, ...), or - for any",
        None,
        true,
    ),
    field(FieldKey::MinPrice, FieldType::Integer, "Enter the minimum price, or - to skip", None, true),
    field(FieldKey::MaxPrice, FieldType::Integer, "Enter the maximum price, or - to skip", None, true),
    field(FieldKey::MinRooms, FieldType::Integer, "Enter the minimum number of rooms, or - to skip", None, true),
    field(FieldKey::MaxRooms, FieldType::Integer, "Enter the maximum number of rooms, or - to skip", None, true),
    field(FieldKey::MinTotalArea, FieldType::Integer, "Enter the minimum total area, or - to skip", None, true),
    field(FieldKey::MaxTotalArea, FieldType::Integer, "Enter the maximum total area, or - to skip", None, true),
    field(FieldKey::Balcony, FieldType::Boolean, "Balcony? (yes/no), or - for any", None, true),
    field(FieldKey::Renovated, FieldType::Boolean, "Renovated? (yes/no), or - for any", None, true),
    field(FieldKey::MinDeposit, FieldType::Integer, "Enter the minimum deposit, or - to skip", None, true),
    field(FieldKey::MaxDeposit, FieldType::Integer, "Enter the maximum deposit, or - to skip", None, true),
    field(FieldKey::Floor, FieldType::Integer, "Enter the floor, or - for any", None, true),
    field(
        FieldKey::IsActive,
        FieldType::Boolean,
        "Notify you about new listings matching this filter? (yes/no)",
        None,
        true,
    ),
    field(FieldKey::TotalFloors, FieldType::Integer, "Enter the total number of floors, or - for any", None, true),
    field(FieldKey::Confirmation, FieldType::Boolean, "Save this filter? (yes/no)", None, false),
];

/// Listing-creation sequence. The contact field is auto-filled from the
/// sender identity; the photo-upload phase follows the last descriptor.
pub static LISTING_CREATE: &[FieldDescriptor] = &[
    field(FieldKey::Contact, FieldType::Text, "Enter the contact for the listing", None, false),
    field(
        FieldKey::PropertyType,
        FieldType::Text,
        "Choose a property type (apartment, house, room, land, commercial)",
        Some(PROPERTY_TYPES),
        false,
    ),
    field(FieldKey::DealType, FieldType::Text, "Choose a deal type (rent, sale)", Some(DEAL_TYPES), false),
    field(FieldKey::Price, FieldType::Integer, "Enter the price", None, false),
    field(FieldKey::City, FieldType::Text, "Enter the city", None, true),
    field(FieldKey::Area, FieldType::Text, "Enter the district", None, true),
    field(FieldKey::Street, FieldType::Text, "Enter the street", None, true),
    field(FieldKey::HouseNumber, FieldType::Text, "Enter the house number", None, true),
    field(FieldKey::ApartmentNumber, FieldType::Text, "Enter the apartment number", None, true),
    field(FieldKey::Rooms, FieldType::Integer, "Enter the number of rooms", None, true),
    field(FieldKey::Balcony, FieldType::Boolean, "Balcony? (yes/no)", None, true),
    field(FieldKey::Renovated, FieldType::Boolean, "Renovated? (yes/no)", None, true),
    field(FieldKey::TotalArea, FieldType::Integer, "Enter the total area", None, true),
    field(FieldKey::Floor, FieldType::Integer, "Enter the floor", None, true),
    field(FieldKey::TotalFloors, FieldType::Integer, "Enter the total number of floors", None, true),
    field(
        FieldKey::Deposit,
        FieldType::Integer,
        "Enter the deposit; enter 0 if there is none or this is not a rental",
        None,
        true,
    ),
    field(FieldKey::Description, FieldType::Text, "Write a description of the listing", None, true),
];

/// Descriptor for editing a single filter field, looked up dynamically.
/// Returns `None` for keys that are not editable filter fields (including
/// the confirmation step).
pub fn update_descriptor(key: FieldKey) -> Option<&'static FieldDescriptor> {
    if key == FieldKey::Confirmation {
        return None;
    }
    FILTER_CREATE.iter().find(|d| d.key == key)
}

/// Why a raw token was rejected for a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: a number is required")]
    NotANumber { field: FieldKey },
    #[error("{field}: expected yes or no")]
    NotYesNo { field: FieldKey },
    #[error("{field}: '{value}' is not one of the allowed options")]
    NotAChoice { field: FieldKey, value: String },
    #[error("{field}: a value is required")]
    Required { field: FieldKey },
}

/// Coerce one raw token per the descriptor's type.
///
/// The sentinel yields [`FieldInput::Absent`] for optional fields and an
/// error for required ones. Anything else is parsed; failures leave the
/// conversation on the same field.
pub fn coerce(desc: &FieldDescriptor, raw: &str) -> Result<FieldInput, ValidationError> {
    let token = raw.trim();
    if token == SENTINEL {
        if desc.optional {
            return Ok(FieldInput::Absent);
        }
        return Err(ValidationError::Required { field: desc.key });
    }

    let value = match desc.field_type {
        FieldType::Text => {
            if let Some(choices) = desc.choices {
                let lowered = token.to_lowercase();
                if !choices.contains(&lowered.as_str()) {
                    return Err(ValidationError::NotAChoice {
                        field: desc.key,
                        value: token.to_string(),
                    });
                }
                FieldValue::Text(lowered)
            } else {
                FieldValue::Text(token.to_string())
            }
        }
        FieldType::Integer => token
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|_| ValidationError::NotANumber { field: desc.key })?,
        FieldType::Boolean => match token.to_lowercase().as_str() {
            "yes" | "true" => FieldValue::Bool(true),
            "no" | "false" => FieldValue::Bool(false),
            _ => return Err(ValidationError::NotYesNo { field: desc.key }),
        },
        FieldType::TextSet => {
            let items: Vec<String> = token
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if items.is_empty() {
                return Err(ValidationError::Required { field: desc.key });
            }
            FieldValue::TextSet(items)
        }
    };

    Ok(FieldInput::Value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(key: FieldKey, schema: &'static [FieldDescriptor]) -> &'static FieldDescriptor {
        schema.iter().find(|d| d.key == key).unwrap()
    }

    #[test]
    fn sentinel_records_explicit_absence() {
        let desc = descriptor(FieldKey::MinPrice, FILTER_CREATE);
        assert_eq!(coerce(desc, "-").unwrap(), FieldInput::Absent);
        assert_eq!(coerce(desc, " - ").unwrap(), FieldInput::Absent);
    }

    #[test]
    fn sentinel_rejected_for_required_fields() {
        let desc = descriptor(FieldKey::Price, LISTING_CREATE);
        assert_eq!(
            coerce(desc, "-"),
            Err(ValidationError::Required { field: FieldKey::Price })
        );
    }

    #[test]
    fn integer_parse_failure_is_retryable() {
        let desc = descriptor(FieldKey::MinPrice, FILTER_CREATE);
        assert_eq!(
            coerce(desc, "abc"),
            Err(ValidationError::NotANumber { field: FieldKey::MinPrice })
        );
        assert_eq!(
            coerce(desc, "40000").unwrap(),
            FieldInput::Value(FieldValue::Int(40000))
        );
    }

    #[test]
    fn boolean_vocabulary() {
        let desc = descriptor(FieldKey::Balcony, FILTER_CREATE);
        assert_eq!(coerce(desc, "yes").unwrap(), FieldInput::Value(FieldValue::Bool(true)));
        assert_eq!(coerce(desc, "NO").unwrap(), FieldInput::Value(FieldValue::Bool(false)));
        assert_eq!(coerce(desc, "true").unwrap(), FieldInput::Value(FieldValue::Bool(true)));
        assert_eq!(
            coerce(desc, "maybe"),
            Err(ValidationError::NotYesNo { field: FieldKey::Balcony })
        );
    }

    #[test]
    fn text_set_splits_and_trims() {
        let desc = descriptor(FieldKey::Areas, FILTER_CREATE);
        assert_eq!(
            coerce(desc, "Downtown,  North Side , Harbor").unwrap(),
            FieldInput::Value(FieldValue::TextSet(vec![
                "Downtown".to_string(),
                "North Side".to_string(),
                "Harbor".to_string(),
            ]))
        );
    }

    #[test]
    fn choice_fields_reject_unknown_values() {
        let desc = descriptor(FieldKey::PropertyType, FILTER_CREATE);
        assert!(matches!(
            coerce(desc, "castle"),
            Err(ValidationError::NotAChoice { field: FieldKey::PropertyType, .. })
        ));
        assert_eq!(
            coerce(desc, "Apartment").unwrap(),
            FieldInput::Value(FieldValue::Text("apartment".to_string()))
        );
    }

    #[test]
    fn filter_schema_ends_in_confirmation() {
        assert_eq!(FILTER_CREATE.last().unwrap().key, FieldKey::Confirmation);
        // The confirmation step demands an explicit yes/no.
        assert!(!FILTER_CREATE.last().unwrap().optional);
    }

    #[test]
    fn update_descriptor_covers_editable_fields_only() {
        assert!(update_descriptor(FieldKey::MinPrice).is_some());
        assert!(update_descriptor(FieldKey::IsActive).is_some());
        assert!(update_descriptor(FieldKey::Confirmation).is_none());
        assert!(update_descriptor(FieldKey::Price).is_none());
        assert!(FieldKey::Areas.is_editable_filter_field());
        assert!(!FieldKey::Description.is_editable_filter_field());
    }

    #[test]
    fn field_key_round_trips_through_strings() {
        for desc in FILTER_CREATE.iter().chain(LISTING_CREATE.iter()) {
            let parsed: FieldKey = desc.key.as_str().parse().unwrap();
            assert_eq!(parsed, desc.key);
        }
        assert!("bogus".parse::<FieldKey>().is_err());
    }
}
