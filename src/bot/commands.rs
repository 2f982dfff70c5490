//! Typed commands parsed from raw chat updates

use crate::fields::FieldKey;

/// One inbound chat message, already reduced to the pieces the bot needs.
#[derive(Debug, Clone)]
pub struct ChatUpdate {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub text: Option<String>,
    /// Telegram file id of an attached photo, if any.
    pub photo_file_id: Option<String>,
}

/// What the user asked for. Slash commands address the bot; `Field` is the
/// one-shot `field: value` form used by the update flow; anything else is a
/// plain answer to whatever the current conversation is asking.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    NewFilter,
    ListFilters,
    UpdateFilter { filter_id: i64 },
    DeleteFilter { filter_id: i64 },
    Search { filter_id: i64 },
    NewListing,
    Favorites,
    AddFavorite { listing_id: i64 },
    RemoveFavorite { listing_id: i64 },
    RegisterAdmin { user_id: i64 },
    UnregisterAdmin { user_id: i64 },
    MarkSold { listing_id: i64 },
    MarkRented { listing_id: i64 },
    MarkActive { listing_id: i64 },
    ListingStats { listing_id: i64 },
    /// `field: value` during the filter update flow.
    Field { key: FieldKey, raw: String },
    /// Finish the photo phase.
    Done,
    Cancel,
    /// Free text: the answer to the current prompt.
    Text(String),
    /// A slash command the bot does not know, or one missing its argument.
    Unknown(String),
}

/// Parse one message text into a command.
pub fn parse(text: &str) -> Command {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or("");
        let arg = parts.next();
        return parse_slash(name, arg, trimmed);
    }

    // "field: value" selects and fills an update field in one message
    if let Some((head, tail)) = trimmed.split_once(':') {
        if let Ok(key) = head.trim().parse::<FieldKey>() {
            return Command::Field {
                key,
                raw: tail.trim().to_string(),
            };
        }
    }

    Command::Text(trimmed.to_string())
}

fn parse_slash(name: &str, arg: Option<&str>, original: &str) -> Command {
    let id = |build: fn(i64) -> Command| match arg.and_then(|a| a.parse::<i64>().ok()) {
        Some(n) => build(n),
        None => Command::Unknown(original.to_string()),
    };

    match name {
        "start" => Command::Start,
        "new_filter" => Command::NewFilter,
        "filters" => Command::ListFilters,
        "update_filter" => id(|n| Command::UpdateFilter { filter_id: n }),
        "delete_filter" => id(|n| Command::DeleteFilter { filter_id: n }),
        "search" => id(|n| Command::Search { filter_id: n }),
        "new_listing" => Command::NewListing,
        "favorites" => Command::Favorites,
        "favorite" => id(|n| Command::AddFavorite { listing_id: n }),
        "unfavorite" => id(|n| Command::RemoveFavorite { listing_id: n }),
        "register_admin" => id(|n| Command::RegisterAdmin { user_id: n }),
        "unregister_admin" => id(|n| Command::UnregisterAdmin { user_id: n }),
        "sold" => id(|n| Command::MarkSold { listing_id: n }),
        "rented" => id(|n| Command::MarkRented { listing_id: n }),
        "free" => id(|n| Command::MarkActive { listing_id: n }),
        "stats" => id(|n| Command::ListingStats { listing_id: n }),
        "done" => Command::Done,
        "cancel" => Command::Cancel,
        _ => Command::Unknown(original.to_string()),
    }
}
