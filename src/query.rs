//! Dynamic predicate queries over listings.
//!
//! Two directions share one predicate unit: searching listings for a
//! filter, and matching a new listing against all active filters.

pub mod matching;
pub mod predicates;
pub mod search;

#[cfg(test)]
mod proptests;

pub use matching::matching_subscribers;
pub use predicates::{filter_predicates, Predicate};
pub use search::find_listing;
