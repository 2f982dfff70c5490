//! User-facing message texts
//!
//! Everything the bot says lives here so the dispatcher stays logic-only.
//! Storage failures always render as [`generic_error`]; raw error text
//! never reaches the chat.

use crate::db::{FilterSummary, Listing, Stats};
use crate::fields::{CollectedFields, FieldValue, FILTER_CREATE, MAX_PHOTOS, SENTINEL};
use std::fmt::Write as _;

pub const START_MENU: &str = "Welcome to the listings bot.\n\
    /new_filter - create a search filter\n\
    /filters - list your filters\n\
    /update_filter <id> - change one field of a filter\n\
    /delete_filter <id> - remove a filter\n\
    /search <id> - find a listing for a filter\n\
    /favorites - your saved listings\n\
    /stats <id> - view counters for a listing\n\
    /cancel - abandon the current conversation";

pub const CANCELLED: &str = "Cancelled. Nothing was saved.";
pub const DISCARDED: &str = "Okay, the filter was discarded.";
pub const NOTHING_FOUND: &str = "Nothing found for this filter. Try again later.";
pub const UNAUTHORIZED: &str = "You are not allowed to publish listings.";
pub const GENERIC_ERROR: &str = "Something went wrong on our side. Please try again.";
pub const UNKNOWN_COMMAND: &str = "I did not understand that. Send /start for the menu.";
pub const NOT_YOUR_FILTER: &str = "That filter does not exist or is not yours.";
pub const LISTING_NOT_FOUND: &str = "That listing does not exist.";

pub fn filter_saved(id: i64) -> String {
    format!("Filter saved with id {id}. Use /search {id} to run it.")
}

pub fn filter_deleted(id: i64) -> String {
    format!("Filter {id} deleted.")
}

pub fn filter_updated(id: i64) -> String {
    format!("Filter {id} updated.")
}

pub fn listing_published(id: i64, notified: usize) -> String {
    format!("Listing {id} published. {notified} subscriber(s) notified.")
}

pub fn listing_state_changed(id: i64, state: &str) -> String {
    format!("Listing {id} is now marked {state}.")
}

pub fn favorite_added(id: i64) -> String {
    format!("Listing {id} added to your favorites.")
}

pub fn favorite_removed(id: i64) -> String {
    format!("Listing {id} removed from your favorites.")
}

pub fn admin_granted(user_id: i64) -> String {
    format!("User {user_id} can now publish listings.")
}

pub fn admin_revoked(user_id: i64) -> String {
    format!("User {user_id} can no longer publish listings.")
}

pub fn photo_progress(count: usize) -> String {
    if count == 0 {
        format!("Now send up to {MAX_PHOTOS} photos, then /done to publish.")
    } else {
        format!("Photo {count} of {MAX_PHOTOS} received. Send more or /done to publish.")
    }
}

/// The prompt shown when the update flow asks which field to change.
pub fn choose_field(filter_id: i64) -> String {
    let mut text = format!("Which field of filter {filter_id} do you want to change?\n");
    text.push_str("Reply as `field: value` (or `field: -` to clear). Fields:\n");
    let names: Vec<&str> = FILTER_CREATE
        .iter()
        .filter(|d| d.key != crate::fields::FieldKey::Confirmation)
        .map(|d| d.key.as_str())
        .collect();
    text.push_str(&names.join(", "));
    text
}

/// Summary shown before the confirmation step of filter creation.
pub fn filter_summary(collected: &CollectedFields) -> String {
    let mut text = String::from("Your filter:\n");
    for (key, value) in collected {
        let rendered = match value {
            None => SENTINEL.to_string(),
            Some(v) => render_value(v),
        };
        let _ = writeln!(text, "  {key}: {rendered}");
    }
    text
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Int(n) => n.to_string(),
        FieldValue::Bool(true) => "yes".to_string(),
        FieldValue::Bool(false) => "no".to_string(),
        FieldValue::TextSet(items) => items.join(", "),
    }
}

/// The card sent for one listing, in search results and match
/// notifications alike.
pub fn listing_card(listing: &Listing) -> String {
    let mut text = format!(
        "Listing #{}: {} for {}\nPrice: {}",
        listing.id, listing.property_type, listing.deal_type, listing.price
    );
    if let Some(city) = &listing.city {
        let _ = write!(text, "\nCity: {city}");
    }
    if let Some(area) = &listing.area {
        let _ = write!(text, "\nDistrict: {area}");
    }
    if let Some(rooms) = listing.rooms {
        let _ = write!(text, "\nRooms: {rooms}");
    }
    if let Some(total_area) = listing.total_area {
        let _ = write!(text, "\nTotal area: {total_area} m2");
    }
    if let (Some(floor), Some(total)) = (listing.floor, listing.total_floors) {
        let _ = write!(text, "\nFloor: {floor}/{total}");
    }
    if let Some(deposit) = listing.deposit {
        let _ = write!(text, "\nDeposit: {deposit}");
    }
    if listing.balcony == Some(true) {
        text.push_str("\nBalcony");
    }
    if listing.renovated == Some(true) {
        text.push_str("\nRenovated");
    }
    if let Some(description) = &listing.description {
        let _ = write!(text, "\n\n{description}");
    }
    let _ = write!(text, "\n\nContact: {}", listing.contact);
    text
}

pub fn filter_list(filters: &[FilterSummary]) -> String {
    if filters.is_empty() {
        return "You have no filters yet. Send /new_filter to create one.".to_string();
    }
    let mut text = String::from("Your filters:\n");
    for f in filters {
        let name = f.name.as_deref().unwrap_or("(unnamed)");
        let _ = writeln!(text, "  {} - {}", f.id, name);
    }
    text
}

pub fn favorites_list(listing_ids: &[i64]) -> String {
    if listing_ids.is_empty() {
        return "You have no favorites yet.".to_string();
    }
    let ids: Vec<String> = listing_ids.iter().map(ToString::to_string).collect();
    format!("Your favorite listings: {}", ids.join(", "))
}

pub fn stats_report(stats: &Stats) -> String {
    format!(
        "Views: {}, favorites: {}, likes: {}",
        stats.views, stats.favorites, stats.likes
    )
}
