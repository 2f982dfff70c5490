//! Property tests for predicate consistency
//!
//! The core guarantee of the query layer: evaluating a filter's predicates
//! in Rust against a listing agrees with running the generated SQL against
//! a database holding that listing as its only row. Optional fields on
//! both sides are exercised, including the unset-field-fails rule.

use super::predicates::filter_predicates;
use super::search::build_search_sql;
use crate::db::{Database, NewFilter, NewListing};
use proptest::prelude::*;

fn opt_i(range: std::ops::Range<i64>) -> impl Strategy<Value = Option<i64>> {
    proptest::option::of(range)
}

fn opt_bool() -> impl Strategy<Value = Option<bool>> {
    proptest::option::of(any::<bool>())
}

fn property_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("apartment".to_string()),
        Just("house".to_string()),
        Just("room".to_string()),
    ]
}

fn deal_type() -> impl Strategy<Value = String> {
    prop_oneof![Just("rent".to_string()), Just("sale".to_string())]
}

fn city() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Moscow".to_string()),
        Just("Kazan".to_string()),
        Just("Sochi".to_string()),
    ]
}

fn district() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Arbat".to_string()),
        Just("Tverskoy".to_string()),
        Just("Khamovniki".to_string()),
    ]
}

fn arb_filter() -> impl Strategy<Value = NewFilter> {
    (
        (
            proptest::option::of(property_type()),
            proptest::option::of(deal_type()),
            proptest::option::of(city()),
            proptest::option::of(proptest::collection::vec(district(), 0..3)),
            opt_bool(),
            opt_bool(),
        ),
        (
            opt_i(0..3000),
            opt_i(0..3000),
            opt_i(0..5),
            opt_i(0..5),
            opt_i(10..100),
            opt_i(10..100),
        ),
        (opt_i(0..2000), opt_i(0..2000), opt_i(0..15), opt_i(0..20)),
    )
        .prop_map(
            |(
                (property_type, deal_type, city, areas, balcony, renovated),
                (min_price, max_price, min_rooms, max_rooms, min_total_area, max_total_area),
                (min_deposit, max_deposit, floor, total_floors),
            )| NewFilter {
                owner_id: 1,
                name: None,
                property_type,
                deal_type,
                city,
                areas,
                min_price,
                max_price,
                min_rooms,
                max_rooms,
                min_total_area,
                max_total_area,
                balcony,
                renovated,
                min_deposit,
                max_deposit,
                floor,
                total_floors,
                is_active: true,
            },
        )
}

fn arb_listing() -> impl Strategy<Value = NewListing> {
    (
        (
            property_type(),
            deal_type(),
            0i64..3000,
            proptest::option::of(city()),
            proptest::option::of(district()),
            opt_i(0..5),
        ),
        (
            opt_bool(),
            opt_bool(),
            opt_i(10..100),
            opt_i(0..15),
            opt_i(0..20),
            opt_i(0..2000),
        ),
    )
        .prop_map(
            |(
                (property_type, deal_type, price, city, area, rooms),
                (balcony, renovated, total_area, floor, total_floors, deposit),
            )| NewListing {
                contact: "@seller".to_string(),
                property_type,
                deal_type,
                price,
                city,
                area,
                street: None,
                house_number: None,
                apartment_number: None,
                rooms,
                balcony,
                renovated,
                total_area,
                floor,
                total_floors,
                deposit,
                description: None,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// In-Rust evaluation and the generated SQL must agree on whether a
    /// listing satisfies a filter.
    #[test]
    fn search_and_match_directions_agree(new_filter in arb_filter(), new_listing in arb_listing()) {
        let db = Database::open_in_memory().unwrap();
        let listing = db.create_listing(&new_listing).unwrap();
        let filter = db.create_filter(new_filter).unwrap();

        let predicates = filter_predicates(&filter);
        let in_rust = predicates.iter().all(|p| p.matches(&listing));

        let (sql, params) = build_search_sql(&predicates);
        let sql_hit = !db.query_listing_ids(&sql, &params).unwrap().is_empty();

        prop_assert_eq!(
            in_rust,
            sql_hit,
            "directions disagree for filter {:?} against listing {:?}",
            filter,
            listing
        );
    }

    /// An unconstrained filter matches every active listing in both
    /// directions.
    #[test]
    fn unconstrained_filter_matches_everything(new_listing in arb_listing()) {
        let db = Database::open_in_memory().unwrap();
        let listing = db.create_listing(&new_listing).unwrap();
        let filter = db
            .create_filter(NewFilter {
                owner_id: 1,
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();

        let predicates = filter_predicates(&filter);
        prop_assert!(predicates.iter().all(|p| p.matches(&listing)));

        let (sql, params) = build_search_sql(&predicates);
        prop_assert_eq!(db.query_listing_ids(&sql, &params).unwrap(), vec![listing.id]);
    }
}
