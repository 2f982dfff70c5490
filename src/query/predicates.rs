//! Shared predicate construction
//!
//! One unit feeds both query directions: a predicate can emit a
//! parameterized SQL fragment (searching listings for a filter) and can
//! evaluate itself directly against a listing (matching a new listing
//! against subscriber filters). Keeping both behind the same enum is what
//! guarantees the two directions agree.

use crate::db::{FilterSpec, Listing};
use rusqlite::types::Value as SqlValue;

/// One conjunct of a filter. A listing must satisfy every predicate; a
/// predicate on a field the listing leaves unset fails, which is exactly
/// how `NULL` compares in the SQL direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    PropertyType(String),
    DealType(String),
    City(String),
    /// Listing district must be one of these.
    AreaIn(Vec<String>),
    MinPrice(i64),
    MaxPrice(i64),
    MinRooms(i64),
    MaxRooms(i64),
    MinTotalArea(i64),
    MaxTotalArea(i64),
    MinDeposit(i64),
    MaxDeposit(i64),
    Balcony(bool),
    Renovated(bool),
    Floor(i64),
    TotalFloors(i64),
}

impl Predicate {
    /// SQL fragment plus its bound parameters. Fragments contain only
    /// static column names and `?` placeholders.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        match self {
            Predicate::PropertyType(v) => eq("property_type", SqlValue::Text(v.clone())),
            Predicate::DealType(v) => eq("deal_type", SqlValue::Text(v.clone())),
            Predicate::City(v) => eq("city", SqlValue::Text(v.clone())),
            Predicate::AreaIn(areas) => {
                let placeholders = vec!["?"; areas.len()].join(", ");
                let params = areas
                    .iter()
                    .map(|a| SqlValue::Text(a.clone()))
                    .collect();
                (format!("area IN ({placeholders})"), params)
            }
            Predicate::MinPrice(n) => cmp("price", ">=", *n),
            Predicate::MaxPrice(n) => cmp("price", "<=", *n),
            Predicate::MinRooms(n) => cmp("rooms", ">=", *n),
            Predicate::MaxRooms(n) => cmp("rooms", "<=", *n),
            Predicate::MinTotalArea(n) => cmp("total_area", ">=", *n),
            Predicate::MaxTotalArea(n) => cmp("total_area", "<=", *n),
            Predicate::MinDeposit(n) => cmp("deposit", ">=", *n),
            Predicate::MaxDeposit(n) => cmp("deposit", "<=", *n),
            Predicate::Balcony(b) => eq("balcony", SqlValue::Integer(i64::from(*b))),
            Predicate::Renovated(b) => eq("renovated", SqlValue::Integer(i64::from(*b))),
            Predicate::Floor(n) => eq("floor", SqlValue::Integer(*n)),
            Predicate::TotalFloors(n) => eq("total_floors", SqlValue::Integer(*n)),
        }
    }

    /// Evaluate against a listing's scalars. Must agree with [`to_sql`]
    /// under SQLite's `NULL` comparison rules.
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Predicate::PropertyType(v) => listing.property_type == *v,
            Predicate::DealType(v) => listing.deal_type == *v,
            Predicate::City(v) => listing.city.as_deref() == Some(v.as_str()),
            Predicate::AreaIn(areas) => listing
                .area
                .as_deref()
                .is_some_and(|a| areas.iter().any(|candidate| candidate == a)),
            Predicate::MinPrice(n) => listing.price >= *n,
            Predicate::MaxPrice(n) => listing.price <= *n,
            Predicate::MinRooms(n) => listing.rooms.is_some_and(|v| v >= *n),
            Predicate::MaxRooms(n) => listing.rooms.is_some_and(|v| v <= *n),
            Predicate::MinTotalArea(n) => listing.total_area.is_some_and(|v| v >= *n),
            Predicate::MaxTotalArea(n) => listing.total_area.is_some_and(|v| v <= *n),
            Predicate::MinDeposit(n) => listing.deposit.is_some_and(|v| v >= *n),
            Predicate::MaxDeposit(n) => listing.deposit.is_some_and(|v| v <= *n),
            Predicate::Balcony(b) => listing.balcony == Some(*b),
            Predicate::Renovated(b) => listing.renovated == Some(*b),
            Predicate::Floor(n) => listing.floor == Some(*n),
            Predicate::TotalFloors(n) => listing.total_floors == Some(*n),
        }
    }
}

fn eq(column: &str, value: SqlValue) -> (String, Vec<SqlValue>) {
    (format!("{column} = ?"), vec![value])
}

fn cmp(column: &str, op: &str, value: i64) -> (String, Vec<SqlValue>) {
    (format!("{column} {op} ?"), vec![SqlValue::Integer(value)])
}

/// Every constraint a filter expresses, in schema order. Unset fields
/// contribute nothing; range bounds contribute independently, so a filter
/// with only a minimum still constrains.
pub fn filter_predicates(filter: &FilterSpec) -> Vec<Predicate> {
    let mut preds = Vec::new();
    if let Some(v) = &filter.property_type {
        preds.push(Predicate::PropertyType(v.clone()));
    }
    if let Some(v) = &filter.deal_type {
        preds.push(Predicate::DealType(v.clone()));
    }
    if let Some(v) = &filter.city {
        preds.push(Predicate::City(v.clone()));
    }
    if let Some(areas) = &filter.areas {
        if !areas.is_empty() {
            preds.push(Predicate::AreaIn(areas.clone()));
        }
    }
    if let Some(n) = filter.min_price {
        preds.push(Predicate::MinPrice(n));
    }
    if let Some(n) = filter.max_price {
        preds.push(Predicate::MaxPrice(n));
    }
    if let Some(n) = filter.min_rooms {
        preds.push(Predicate::MinRooms(n));
    }
    if let Some(n) = filter.max_rooms {
        preds.push(Predicate::MaxRooms(n));
    }
    if let Some(n) = filter.min_total_area {
        preds.push(Predicate::MinTotalArea(n));
    }
    if let Some(n) = filter.max_total_area {
        preds.push(Predicate::MaxTotalArea(n));
    }
    if let Some(b) = filter.balcony {
        preds.push(Predicate::Balcony(b));
    }
    if let Some(b) = filter.renovated {
        preds.push(Predicate::Renovated(b));
    }
    if let Some(n) = filter.min_deposit {
        preds.push(Predicate::MinDeposit(n));
    }
    if let Some(n) = filter.max_deposit {
        preds.push(Predicate::MaxDeposit(n));
    }
    if let Some(n) = filter.floor {
        preds.push(Predicate::Floor(n));
    }
    if let Some(n) = filter.total_floors {
        preds.push(Predicate::TotalFloors(n));
    }
    preds
}
