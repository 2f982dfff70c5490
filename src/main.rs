//! estatebot - real-estate listing bot backend
//!
//! A per-user conversation engine over a SQLite listing store, fronted by
//! a Telegram webhook and a small admin/data REST API.

mod api;
mod bot;
mod conversation;
mod db;
mod fields;
mod query;

use api::{create_router, AppState};
use bot::{Dispatcher, TelegramTransport};
use conversation::{ConversationEngine, InMemorySessionStore};
use db::Database;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "estatebot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("ESTATEBOT_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.estatebot/estatebot.db")
    });

    let port: u16 = std::env::var("ESTATEBOT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
    if token.is_empty() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set; outbound chat calls will fail");
    }

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;

    // Optional bootstrap admin, so the first publisher can be granted
    // without touching the database by hand
    if let Some(admin_id) = std::env::var("ESTATEBOT_ADMIN_ID")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
    {
        db.set_admin(admin_id, true)?;
    }

    // Wire the bot core: engine over in-memory sessions, admin-gated
    // publishing, Telegram transport
    let transport = Arc::new(TelegramTransport::new(token)?);
    let engine = ConversationEngine::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(db.clone()),
    );
    let dispatcher = Dispatcher::new(db.clone(), engine, transport.clone());

    let state = AppState::new(db, dispatcher, transport);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("estatebot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
