//! HTTP request and response types

use crate::db::{FilterSummary, ListingState, NewListing, StatCounter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: String) -> Self {
        Self { error }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

// ============================================================
// Webhook payload (the subset of a Telegram update the bot uses)
// ============================================================

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[allow(dead_code)]
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub from: TelegramUser,
    pub chat: TelegramChat,
    pub text: Option<String>,
    /// Photo renditions, smallest first; the last is the original size.
    pub photo: Option<Vec<TelegramPhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
}

// ============================================================
// Data endpoints
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListListingsQuery {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListingIdsResponse {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct FiltersResponse {
    pub filters: Vec<FilterSummary>,
}

#[derive(Debug, Deserialize)]
pub struct StateChangeRequest {
    pub state: ListingState,
}

#[derive(Debug, Deserialize)]
pub struct IncrementStatRequest {
    pub counter: StatCounter,
}

/// Photo body; `data` is base64.
#[derive(Debug, Deserialize)]
pub struct PhotoUploadRequest {
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub data: String,
}

/// Bulk import: each listing is created and run through the match/notify
/// path, exactly as if it had been published through the bot.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub listings: Vec<NewListing>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub created: Vec<i64>,
    pub notified: usize,
}
