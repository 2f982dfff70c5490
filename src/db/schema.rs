//! Database schema and record types

use crate::fields::{CollectedFields, FieldKey, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    is_admin BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS filters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    name TEXT,
    property_type TEXT,
    deal_type TEXT,
    city TEXT,
    areas TEXT,
    min_price INTEGER,
    max_price INTEGER,
    min_rooms INTEGER,
    max_rooms INTEGER,
    min_total_area INTEGER,
    max_total_area INTEGER,
    balcony BOOLEAN,
    renovated BOOLEAN,
    min_deposit INTEGER,
    max_deposit INTEGER,
    floor INTEGER,
    total_floors INTEGER,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_filters_owner ON filters(owner_id);
CREATE INDEX IF NOT EXISTS idx_filters_active ON filters(is_active);

CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state TEXT NOT NULL DEFAULT 'active',
    contact TEXT NOT NULL,
    property_type TEXT NOT NULL,
    deal_type TEXT NOT NULL,
    price INTEGER NOT NULL,
    city TEXT,
    area TEXT,
    street TEXT,
    house_number TEXT,
    apartment_number TEXT,
    rooms INTEGER,
    balcony BOOLEAN,
    renovated BOOLEAN,
    total_area INTEGER,
    floor INTEGER,
    total_floors INTEGER,
    deposit INTEGER,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_state ON listings(state);
CREATE INDEX IF NOT EXISTS idx_listings_created ON listings(created_at DESC);

CREATE TABLE IF NOT EXISTS listing_photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_listing ON listing_photos(listing_id, position);

CREATE TABLE IF NOT EXISTS listing_stats (
    listing_id INTEGER PRIMARY KEY,
    views INTEGER NOT NULL DEFAULT 0,
    favorites INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS global_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    views INTEGER NOT NULL DEFAULT 0,
    favorites INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO global_stats (id) VALUES (1);

CREATE TABLE IF NOT EXISTS favorites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    listing_id INTEGER NOT NULL,
    UNIQUE (user_id, listing_id)
);

CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);
";

/// Publication state of a listing. Transitions are admin-triggered and
/// unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    Sold,
    Rented,
}

impl ListingState {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingState::Active => "active",
            ListingState::Sold => "sold",
            ListingState::Rented => "rented",
        }
    }
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ListingState::Active),
            "sold" => Ok(ListingState::Sold),
            "rented" => Ok(ListingState::Rented),
            other => Err(format!("unknown listing state: {other}")),
        }
    }
}

/// A saved, named subscription describing desired listing attributes.
/// Every attribute is independently optional: an unset field matches
/// any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub id: i64,
    pub owner_id: i64,
    pub name: Option<String>,
    pub property_type: Option<String>,
    pub deal_type: Option<String>,
    pub city: Option<String>,
    pub areas: Option<Vec<String>>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rooms: Option<i64>,
    pub max_rooms: Option<i64>,
    pub min_total_area: Option<i64>,
    pub max_total_area: Option<i64>,
    pub balcony: Option<bool>,
    pub renovated: Option<bool>,
    pub min_deposit: Option<i64>,
    pub max_deposit: Option<i64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub is_active: bool,
}

/// Filter attributes before insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFilter {
    pub owner_id: i64,
    pub name: Option<String>,
    pub property_type: Option<String>,
    pub deal_type: Option<String>,
    pub city: Option<String>,
    pub areas: Option<Vec<String>>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rooms: Option<i64>,
    pub max_rooms: Option<i64>,
    pub min_total_area: Option<i64>,
    pub max_total_area: Option<i64>,
    pub balcony: Option<bool>,
    pub renovated: Option<bool>,
    pub min_deposit: Option<i64>,
    pub max_deposit: Option<i64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub is_active: bool,
}

fn take_text(fields: &CollectedFields, key: FieldKey) -> Option<String> {
    fields
        .get(&key)
        .and_then(|v| v.as_ref())
        .and_then(|v| v.as_text().map(str::to_string))
}

fn take_int(fields: &CollectedFields, key: FieldKey) -> Option<i64> {
    fields.get(&key).and_then(|v| v.as_ref()).and_then(FieldValue::as_int)
}

fn take_bool(fields: &CollectedFields, key: FieldKey) -> Option<bool> {
    fields.get(&key).and_then(|v| v.as_ref()).and_then(FieldValue::as_bool)
}

fn take_set(fields: &CollectedFields, key: FieldKey) -> Option<Vec<String>> {
    fields
        .get(&key)
        .and_then(|v| v.as_ref())
        .and_then(|v| v.as_text_set().map(<[String]>::to_vec))
}

impl NewFilter {
    /// Build a filter from a completed filter-creation conversation.
    /// A skipped `is_active` defaults to true.
    pub fn from_collected(owner_id: i64, fields: &CollectedFields) -> Self {
        Self {
            owner_id,
            name: take_text(fields, FieldKey::Name),
            property_type: take_text(fields, FieldKey::PropertyType),
            deal_type: take_text(fields, FieldKey::DealType),
            city: take_text(fields, FieldKey::City),
            areas: take_set(fields, FieldKey::Areas),
            min_price: take_int(fields, FieldKey::MinPrice),
            max_price: take_int(fields, FieldKey::MaxPrice),
            min_rooms: take_int(fields, FieldKey::MinRooms),
            max_rooms: take_int(fields, FieldKey::MaxRooms),
            min_total_area: take_int(fields, FieldKey::MinTotalArea),
            max_total_area: take_int(fields, FieldKey::MaxTotalArea),
            balcony: take_bool(fields, FieldKey::Balcony),
            renovated: take_bool(fields, FieldKey::Renovated),
            min_deposit: take_int(fields, FieldKey::MinDeposit),
            max_deposit: take_int(fields, FieldKey::MaxDeposit),
            floor: take_int(fields, FieldKey::Floor),
            total_floors: take_int(fields, FieldKey::TotalFloors),
            is_active: take_bool(fields, FieldKey::IsActive).unwrap_or(true),
        }
    }
}

/// A published property record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub state: ListingState,
    pub contact: String,
    pub property_type: String,
    pub deal_type: String,
    pub price: i64,
    pub city: Option<String>,
    pub area: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub apartment_number: Option<String>,
    pub rooms: Option<i64>,
    pub balcony: Option<bool>,
    pub renovated: Option<bool>,
    pub total_area: Option<i64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub deposit: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing attributes before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListing {
    pub contact: String,
    pub property_type: String,
    pub deal_type: String,
    pub price: i64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub apartment_number: Option<String>,
    #[serde(default)]
    pub rooms: Option<i64>,
    #[serde(default)]
    pub balcony: Option<bool>,
    #[serde(default)]
    pub renovated: Option<bool>,
    #[serde(default)]
    pub total_area: Option<i64>,
    #[serde(default)]
    pub floor: Option<i64>,
    #[serde(default)]
    pub total_floors: Option<i64>,
    #[serde(default)]
    pub deposit: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A completed listing-creation conversation missing one of its mandatory
/// fields. Indicates a schema bug rather than bad user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("listing draft is missing required field {0}")]
pub struct IncompleteDraft(pub FieldKey);

impl NewListing {
    /// Build a listing from a completed listing-creation conversation.
    pub fn from_collected(fields: &CollectedFields) -> Result<Self, IncompleteDraft> {
        Ok(Self {
            contact: take_text(fields, FieldKey::Contact)
                .ok_or(IncompleteDraft(FieldKey::Contact))?,
            property_type: take_text(fields, FieldKey::PropertyType)
                .ok_or(IncompleteDraft(FieldKey::PropertyType))?,
            deal_type: take_text(fields, FieldKey::DealType)
                .ok_or(IncompleteDraft(FieldKey::DealType))?,
            price: take_int(fields, FieldKey::Price).ok_or(IncompleteDraft(FieldKey::Price))?,
            city: take_text(fields, FieldKey::City),
            area: take_text(fields, FieldKey::Area),
            street: take_text(fields, FieldKey::Street),
            house_number: take_text(fields, FieldKey::HouseNumber),
            apartment_number: take_text(fields, FieldKey::ApartmentNumber),
            rooms: take_int(fields, FieldKey::Rooms),
            balcony: take_bool(fields, FieldKey::Balcony),
            renovated: take_bool(fields, FieldKey::Renovated),
            total_area: take_int(fields, FieldKey::TotalArea),
            floor: take_int(fields, FieldKey::Floor),
            total_floors: take_int(fields, FieldKey::TotalFloors),
            deposit: take_int(fields, FieldKey::Deposit),
            description: take_text(fields, FieldKey::Description),
        })
    }
}

/// View/favorite/like counters, per listing or bot-wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub views: i64,
    pub favorites: i64,
    pub likes: i64,
}

/// Which counter to bump. The column is chosen from this enum so counter
/// names never travel through SQL text as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatCounter {
    Views,
    Favorites,
    Likes,
}

impl StatCounter {
    pub fn column(self) -> &'static str {
        match self {
            StatCounter::Views => "views",
            StatCounter::Favorites => "favorites",
            StatCounter::Likes => "likes",
        }
    }
}

/// One row of a user's favorites list.
#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub id: i64,
    pub listing_id: i64,
}

/// Compact filter listing for menus.
#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub id: i64,
    pub name: Option<String>,
}
