//! Match direction: new listing -> subscriber set
//!
//! Runs the same predicates as the search direction, evaluated in process
//! against the listing's scalars. Every active filter is checked; owners
//! are deduplicated so a user with several matching filters is notified
//! once.

use super::predicates::filter_predicates;
use crate::db::{Database, DbResult, Listing, ListingState};
use std::collections::HashSet;
use tracing::debug;

/// Owners of active filters the listing satisfies. Inactive filters are
/// skipped; a non-active listing matches nobody.
pub fn matching_subscribers(db: &Database, listing: &Listing) -> DbResult<HashSet<i64>> {
    if listing.state != ListingState::Active {
        return Ok(HashSet::new());
    }

    let mut owners = HashSet::new();
    for filter in db.list_active_filters()? {
        if filter_predicates(&filter).iter().all(|p| p.matches(listing)) {
            owners.insert(filter.owner_id);
        }
    }
    debug!(listing_id = listing.id, subscribers = owners.len(), "match computed");
    Ok(owners)
}
