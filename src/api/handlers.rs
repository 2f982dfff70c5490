//! HTTP request handlers

use super::types::{
    ErrorResponse, FiltersResponse, ImportRequest, ImportResponse, IncrementStatRequest,
    ListListingsQuery, ListingIdsResponse, PhotoResponse, PhotoUploadRequest, StateChangeRequest,
    SuccessResponse, TelegramUpdate, VersionResponse,
};
use super::AppState;
use crate::bot::{messages, ChatUpdate};
use crate::db::{DbError, FilterSpec, Listing, Stats};
use crate::fields::MAX_PHOTOS;
use crate::query::matching_subscribers;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use tracing::warn;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat intake
        .route("/webhook", post(webhook))
        // Filters
        .route("/api/filters/:id", get(get_filter))
        .route("/api/users/:id/filters", get(list_user_filters))
        // Listings
        .route("/api/listings", get(list_listings))
        .route("/api/listings/import", post(import_listings))
        .route("/api/listings/:id", get(get_listing))
        .route("/api/listings/:id/state", post(set_listing_state))
        .route("/api/listings/:id/delete", post(delete_listing))
        .route(
            "/api/listings/:id/stats",
            get(listing_stats).post(increment_stat),
        )
        .route("/api/listings/:id/photos", post(upload_photo))
        .route("/api/listings/:id/photos/:index", get(get_photo))
        // Bot-wide stats
        .route("/api/stats", get(global_stats))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Telegram update intake. The update is queued onto the sender's worker
/// and the webhook acknowledges immediately.
async fn webhook(
    State(state): State<AppState>,
    Json(update): Json<TelegramUpdate>,
) -> Json<SuccessResponse> {
    let Some(message) = update.message else {
        // non-message updates (edits, callbacks) are ignored
        return Json(SuccessResponse { success: true });
    };

    let photo_file_id = message
        .photo
        .as_ref()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file_id.clone());

    state
        .dispatcher
        .dispatch(ChatUpdate {
            user_id: message.from.id,
            chat_id: message.chat.id,
            username: message.from.username,
            text: message.text,
            photo_file_id,
        })
        .await;

    Json(SuccessResponse { success: true })
}

// ============================================================
// Filters
// ============================================================

async fn get_filter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FilterSpec>, AppError> {
    Ok(Json(state.db.get_filter(id)?))
}

async fn list_user_filters(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FiltersResponse>, AppError> {
    Ok(Json(FiltersResponse {
        filters: state.db.list_filters(id)?,
    }))
}

// ============================================================
// Listings
// ============================================================

async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(state.db.get_listing(id)?))
}

async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListListingsQuery>,
) -> Result<Json<ListingIdsResponse>, AppError> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    Ok(Json(ListingIdsResponse {
        ids: state.db.list_listing_ids(offset, limit)?,
    }))
}

async fn set_listing_state(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StateChangeRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.set_listing_state(id, request.state)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_listing(id)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn listing_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Stats>, AppError> {
    Ok(Json(state.db.listing_stats(id)?))
}

/// Bump one counter on a listing (and the bot-wide total). Lets external
/// frontends report views and likes the bot itself never observes.
async fn increment_stat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<IncrementStatRequest>,
) -> Result<Json<Stats>, AppError> {
    state.db.get_listing(id)?;
    state.db.increment_stat(id, request.counter)?;
    Ok(Json(state.db.listing_stats(id)?))
}

async fn global_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    Ok(Json(state.db.global_stats()?))
}

// ============================================================
// Photos
// ============================================================

async fn upload_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PhotoUploadRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(&request.data)
        .map_err(|e| AppError::BadRequest(format!("invalid base64 photo: {e}")))?;

    // the listing must exist, and the per-listing cap holds here too
    state.db.get_listing(id)?;
    let count = state.db.photo_count(id)?;
    if count >= MAX_PHOTOS as i64 {
        return Err(AppError::BadRequest(format!(
            "listing {id} already has {MAX_PHOTOS} photos"
        )));
    }

    state.db.add_photo(id, &data)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_photo(
    State(state): State<AppState>,
    Path((id, index)): Path<(i64, i64)>,
) -> Result<Json<PhotoResponse>, AppError> {
    let data = state.db.get_photo(id, index)?;
    Ok(Json(PhotoResponse {
        data: base64::engine::general_purpose::STANDARD.encode(data),
    }))
}

// ============================================================
// Bulk import
// ============================================================

/// Create every listing in the batch and run each through the
/// match/notify path. Notification failures are logged, not fatal.
async fn import_listings(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let mut created = Vec::with_capacity(request.listings.len());
    let mut notified = 0usize;

    for new in &request.listings {
        let listing = state.db.create_listing(new)?;
        created.push(listing.id);

        let subscribers = match matching_subscribers(&state.db, &listing) {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(listing_id = listing.id, error = %e, "subscriber match failed");
                continue;
            }
        };
        let card = messages::listing_card(&listing);
        for owner in subscribers {
            match state.transport.send_message(owner, &card).await {
                Ok(()) => notified += 1,
                Err(e) => warn!(owner, error = %e, "import notification failed"),
            }
        }
    }

    Ok(Json(ImportResponse { created, notified }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::FilterNotFound(_)
            | DbError::ListingNotFound(_)
            | DbError::PhotoNotFound { .. } => AppError::NotFound(error.to_string()),
            DbError::NotAFilterField(_) => AppError::BadRequest(error.to_string()),
            DbError::Sqlite(_) => AppError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
