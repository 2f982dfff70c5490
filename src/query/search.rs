//! Search direction: filter -> one random qualifying listing
//!
//! The query is assembled from static fragments joined with AND; every
//! user-supplied value travels as a bound parameter. Selection among the
//! qualifying ids is uniform and deliberately non-deterministic, so
//! repeated searches surface different listings.

use super::predicates::{filter_predicates, Predicate};
use crate::db::{Database, DbResult};
use rand::seq::SliceRandom;
use rusqlite::types::Value as SqlValue;
use tracing::debug;

/// Build the id query for a predicate set. Listings that are sold or
/// rented never qualify, independent of the filter.
pub(crate) fn build_search_sql(predicates: &[Predicate]) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("SELECT id FROM listings WHERE state = 'active'");
    let mut params = Vec::new();
    for pred in predicates {
        let (fragment, mut values) = pred.to_sql();
        sql.push_str(" AND ");
        sql.push_str(&fragment);
        params.append(&mut values);
    }
    (sql, params)
}

/// Pick one active listing satisfying the filter, uniformly at random.
/// `None` when nothing qualifies.
pub fn find_listing(db: &Database, filter_id: i64) -> DbResult<Option<i64>> {
    let filter = db.get_filter(filter_id)?;
    let predicates = filter_predicates(&filter);
    let (sql, params) = build_search_sql(&predicates);
    let ids = db.query_listing_ids(&sql, &params)?;
    debug!(filter_id, candidates = ids.len(), "search executed");
    Ok(ids.choose(&mut rand::thread_rng()).copied())
}
