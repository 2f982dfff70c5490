//! Per-user sequential routing and completion side effects
//!
//! Each user gets one worker task fed by an mpsc channel, so that user's
//! updates are processed strictly in arrival order while different users
//! proceed concurrently. The handler consults the conversation engine,
//! performs completion side effects against storage, and renders replies
//! through the message module.

use super::commands::{self, ChatUpdate, Command};
use super::messages;
use super::transport::ChatTransport;
use crate::conversation::{
    ConversationEngine, EngineError, Event, SessionState, StartRequest, Step, StepOutput,
    TransitionError,
};
use crate::db::{Database, DbError, ListingState, NewFilter, NewListing, StatCounter};
use crate::fields::FieldKey;
use crate::query::{find_listing, matching_subscribers};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

const WORKER_QUEUE_DEPTH: usize = 32;

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    db: Database,
    engine: ConversationEngine,
    transport: Arc<dyn ChatTransport>,
    workers: Mutex<HashMap<i64, mpsc::Sender<ChatUpdate>>>,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        engine: ConversationEngine,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                engine,
                transport,
                workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue an update onto the sender's worker, creating it on first
    /// contact. Updates from one user are handled strictly in order.
    pub async fn dispatch(&self, update: ChatUpdate) {
        let user_id = update.user_id;
        let tx = {
            let mut workers = self.inner.workers.lock().await;
            match workers.get(&user_id) {
                Some(tx) if !tx.is_closed() => tx.clone(),
                _ => {
                    let (tx, mut rx) = mpsc::channel::<ChatUpdate>(WORKER_QUEUE_DEPTH);
                    let dispatcher = self.clone();
                    tokio::spawn(async move {
                        while let Some(update) = rx.recv().await {
                            dispatcher.handle_update(update).await;
                        }
                        info!(user_id, "worker stopped");
                    });
                    workers.insert(user_id, tx.clone());
                    tx
                }
            }
        };
        if tx.send(update).await.is_err() {
            warn!(user_id, "worker queue closed, update dropped");
        }
    }

    /// Process one update to completion. Called by workers; exposed so
    /// tests can drive the bot synchronously.
    pub async fn handle_update(&self, update: ChatUpdate) {
        if let Err(e) = self.inner.db.ensure_user(update.user_id) {
            error!(user_id = update.user_id, error = %e, "user upsert failed");
        }

        if let Some(file_id) = &update.photo_file_id {
            self.handle_photo(&update, file_id).await;
            return;
        }

        let Some(text) = update.text.as_deref() else {
            return;
        };
        let command = commands::parse(text);
        self.handle_command(&update, command).await;
    }

    async fn handle_photo(&self, update: &ChatUpdate, file_id: &str) {
        let data = match self.inner.transport.download_file(file_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(user_id = update.user_id, error = %e, "photo download failed");
                self.say(update, messages::GENERIC_ERROR).await;
                return;
            }
        };
        self.submit(update, Event::Photo { data }).await;
    }

    async fn handle_command(&self, update: &ChatUpdate, command: Command) {
        match command {
            Command::Start => self.say(update, messages::START_MENU).await,
            Command::Cancel => {
                self.inner.engine.cancel(update.user_id);
                self.say(update, messages::CANCELLED).await;
            }
            Command::Unknown(_) => self.say(update, messages::UNKNOWN_COMMAND).await,

            Command::NewFilter => self.start(update, StartRequest::Filter).await,
            Command::NewListing => {
                let contact = update
                    .username
                    .as_ref()
                    .map_or_else(|| format!("user:{}", update.user_id), |u| format!("@{u}"));
                self.start(update, StartRequest::Listing { contact }).await;
            }
            Command::UpdateFilter { filter_id } => {
                if !self.owns_filter(update, filter_id).await {
                    return;
                }
                self.start(update, StartRequest::Update { filter_id }).await;
            }

            Command::ListFilters => match self.inner.db.list_filters(update.user_id) {
                Ok(filters) => self.say(update, &messages::filter_list(&filters)).await,
                Err(e) => self.storage_error(update, &e).await,
            },
            Command::DeleteFilter { filter_id } => {
                if !self.owns_filter(update, filter_id).await {
                    return;
                }
                match self.inner.db.delete_filter(filter_id) {
                    Ok(()) => self.say(update, &messages::filter_deleted(filter_id)).await,
                    Err(e) => self.storage_error(update, &e).await,
                }
            }
            Command::Search { filter_id } => {
                if !self.owns_filter(update, filter_id).await {
                    return;
                }
                self.run_search(update, filter_id).await;
            }

            Command::Favorites => match self.inner.db.list_favorites(update.user_id) {
                Ok(favorites) => {
                    let ids: Vec<i64> = favorites.iter().map(|f| f.listing_id).collect();
                    self.say(update, &messages::favorites_list(&ids)).await;
                }
                Err(e) => self.storage_error(update, &e).await,
            },
            Command::AddFavorite { listing_id } => {
                match self
                    .inner
                    .db
                    .get_listing(listing_id)
                    .and_then(|_| self.inner.db.add_favorite(update.user_id, listing_id))
                {
                    Ok(()) => {
                        // counter is best effort
                        if let Err(e) = self.inner.db.increment_stat(listing_id, StatCounter::Favorites) {
                            warn!(listing_id, error = %e, "favorite counter not bumped");
                        }
                        self.say(update, &messages::favorite_added(listing_id)).await;
                    }
                    Err(DbError::ListingNotFound(_)) => {
                        self.say(update, messages::LISTING_NOT_FOUND).await;
                    }
                    Err(e) => self.storage_error(update, &e).await,
                }
            }
            Command::RemoveFavorite { listing_id } => {
                match self.inner.db.remove_favorite(update.user_id, listing_id) {
                    Ok(()) => self.say(update, &messages::favorite_removed(listing_id)).await,
                    Err(e) => self.storage_error(update, &e).await,
                }
            }

            Command::RegisterAdmin { user_id } => {
                self.admin_change(update, user_id, true).await;
            }
            Command::UnregisterAdmin { user_id } => {
                self.admin_change(update, user_id, false).await;
            }
            Command::MarkSold { listing_id } => {
                self.state_change(update, listing_id, ListingState::Sold).await;
            }
            Command::MarkRented { listing_id } => {
                self.state_change(update, listing_id, ListingState::Rented).await;
            }
            Command::MarkActive { listing_id } => {
                self.state_change(update, listing_id, ListingState::Active).await;
            }
            Command::ListingStats { listing_id } => {
                match self.inner.db.listing_stats(listing_id) {
                    Ok(stats) => self.say(update, &messages::stats_report(&stats)).await,
                    Err(DbError::ListingNotFound(_)) => {
                        self.say(update, messages::LISTING_NOT_FOUND).await;
                    }
                    Err(e) => self.storage_error(update, &e).await,
                }
            }

            Command::Field { key, raw } => {
                // selects the field and supplies the value in one message
                match self
                    .inner
                    .engine
                    .submit(update.user_id, Event::FieldChoice { field: key })
                    .await
                {
                    Ok(_) => self.submit(update, Event::Text { raw }).await,
                    Err(e) => self.engine_error(update, &e).await,
                }
            }
            Command::Done => self.submit(update, Event::FinishPhotos).await,
            Command::Text(raw) => self.submit(update, Event::Text { raw }).await,
        }
    }

    async fn start(&self, update: &ChatUpdate, request: StartRequest) {
        match self.inner.engine.start(update.user_id, request).await {
            Ok(step) => self.render_step(update, step).await,
            Err(e) => self.engine_error(update, &e).await,
        }
    }

    async fn submit(&self, update: &ChatUpdate, event: Event) {
        match self.inner.engine.submit(update.user_id, event).await {
            Ok(step) => self.render_step(update, step).await,
            Err(e) => self.engine_error(update, &e).await,
        }
    }

    /// True when the filter exists and belongs to the sender; replies
    /// otherwise.
    async fn owns_filter(&self, update: &ChatUpdate, filter_id: i64) -> bool {
        match self.inner.db.get_filter(filter_id) {
            Ok(filter) if filter.owner_id == update.user_id => true,
            Ok(_) | Err(DbError::FilterNotFound(_)) => {
                self.say(update, messages::NOT_YOUR_FILTER).await;
                false
            }
            Err(e) => {
                self.storage_error(update, &e).await;
                false
            }
        }
    }

    async fn admin_change(&self, update: &ChatUpdate, target: i64, grant: bool) {
        match self.inner.db.is_admin(update.user_id) {
            Ok(true) => {}
            Ok(false) => {
                self.say(update, messages::UNAUTHORIZED).await;
                return;
            }
            Err(e) => {
                self.storage_error(update, &e).await;
                return;
            }
        }
        match self.inner.db.set_admin(target, grant) {
            Ok(()) => {
                let text = if grant {
                    messages::admin_granted(target)
                } else {
                    messages::admin_revoked(target)
                };
                self.say(update, &text).await;
            }
            Err(e) => self.storage_error(update, &e).await,
        }
    }

    async fn state_change(&self, update: &ChatUpdate, listing_id: i64, state: ListingState) {
        match self.inner.db.is_admin(update.user_id) {
            Ok(true) => {}
            Ok(false) => {
                self.say(update, messages::UNAUTHORIZED).await;
                return;
            }
            Err(e) => {
                self.storage_error(update, &e).await;
                return;
            }
        }
        match self.inner.db.set_listing_state(listing_id, state) {
            Ok(()) => {
                self.say(update, &messages::listing_state_changed(listing_id, state.as_str()))
                    .await;
            }
            Err(DbError::ListingNotFound(_)) => {
                self.say(update, messages::LISTING_NOT_FOUND).await;
            }
            Err(e) => self.storage_error(update, &e).await,
        }
    }

    async fn run_search(&self, update: &ChatUpdate, filter_id: i64) {
        match find_listing(&self.inner.db, filter_id) {
            Ok(Some(listing_id)) => match self.inner.db.get_listing(listing_id) {
                Ok(listing) => {
                    if let Err(e) = self.inner.db.increment_stat(listing_id, StatCounter::Views) {
                        warn!(listing_id, error = %e, "view counter not bumped");
                    }
                    let card = messages::listing_card(&listing);
                    // lead with the first photo when the listing has one
                    match self.inner.db.get_photo(listing_id, 0) {
                        Ok(photo) => {
                            if let Err(e) = self
                                .inner
                                .transport
                                .send_photo(update.chat_id, photo, &card)
                                .await
                            {
                                warn!(chat_id = update.chat_id, error = %e, "photo not delivered");
                                self.say(update, &card).await;
                            }
                        }
                        Err(DbError::PhotoNotFound { .. }) => self.say(update, &card).await,
                        Err(e) => {
                            warn!(listing_id, error = %e, "photo lookup failed");
                            self.say(update, &card).await;
                        }
                    }
                }
                Err(e) => self.storage_error(update, &e).await,
            },
            Ok(None) => self.say(update, messages::NOTHING_FOUND).await,
            Err(e) => self.storage_error(update, &e).await,
        }
    }

    /// Turn a transition output into replies and side effects.
    async fn render_step(&self, update: &ChatUpdate, step: Step) {
        match step.output {
            StepOutput::Prompt(desc) => {
                if desc.key == FieldKey::Confirmation {
                    if let SessionState::Collecting { collected, .. } = &step.state {
                        let text =
                            format!("{}\n{}", messages::filter_summary(collected), desc.prompt);
                        self.say(update, &text).await;
                        return;
                    }
                }
                self.say(update, desc.prompt).await;
            }
            StepOutput::ChooseField { filter_id } => {
                self.say(update, &messages::choose_field(filter_id)).await;
            }
            StepOutput::AwaitPhotos { count } => {
                self.say(update, &messages::photo_progress(count)).await;
            }
            StepOutput::Cancelled => self.say(update, messages::CANCELLED).await,
            StepOutput::Discarded => self.say(update, messages::DISCARDED).await,

            StepOutput::FilterComplete { collected } => {
                let new = NewFilter::from_collected(update.user_id, &collected);
                match self.inner.db.create_filter(new) {
                    Ok(filter) => self.say(update, &messages::filter_saved(filter.id)).await,
                    Err(e) => self.storage_error(update, &e).await,
                }
            }

            StepOutput::UpdateComplete {
                filter_id,
                field,
                value,
            } => {
                match self
                    .inner
                    .db
                    .update_filter_field(filter_id, field, value.as_ref())
                {
                    Ok(()) => self.say(update, &messages::filter_updated(filter_id)).await,
                    Err(DbError::FilterNotFound(_)) => {
                        self.say(update, messages::NOT_YOUR_FILTER).await;
                    }
                    Err(e) => self.storage_error(update, &e).await,
                }
            }

            StepOutput::ListingComplete { draft, photos } => {
                self.publish_listing(update, &draft, photos).await;
            }
        }
    }

    /// Persist the listing, then its photos, then notify subscribers.
    /// A failed photo write deletes the listing again; there is no
    /// transaction spanning the two tables.
    async fn publish_listing(&self, update: &ChatUpdate, draft: &NewListing, photos: Vec<Vec<u8>>) {
        let listing = match self.inner.db.create_listing(draft) {
            Ok(listing) => listing,
            Err(e) => {
                self.storage_error(update, &e).await;
                return;
            }
        };

        for photo in &photos {
            if let Err(e) = self.inner.db.add_photo(listing.id, photo) {
                error!(listing_id = listing.id, error = %e, "photo write failed, deleting listing");
                if let Err(e) = self.inner.db.delete_listing(listing.id) {
                    error!(listing_id = listing.id, error = %e, "cleanup delete failed");
                }
                self.say(update, messages::GENERIC_ERROR).await;
                return;
            }
        }

        // notification and counters are best effort; the listing stands
        let subscribers = match matching_subscribers(&self.inner.db, &listing) {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(listing_id = listing.id, error = %e, "subscriber match failed");
                Default::default()
            }
        };
        let card = messages::listing_card(&listing);
        let mut notified = 0usize;
        for owner in &subscribers {
            match self.inner.transport.send_message(*owner, &card).await {
                Ok(()) => {
                    notified += 1;
                    if let Err(e) = self.inner.db.increment_stat(listing.id, StatCounter::Views) {
                        warn!(listing_id = listing.id, error = %e, "view counter not bumped");
                    }
                }
                Err(e) => warn!(owner, error = %e, "subscriber notification failed"),
            }
        }

        info!(listing_id = listing.id, notified, "listing published");
        self.say(update, &messages::listing_published(listing.id, notified))
            .await;
    }

    async fn engine_error(&self, update: &ChatUpdate, error: &EngineError) {
        let text = match error {
            EngineError::Unauthorized => messages::UNAUTHORIZED.to_string(),
            EngineError::Transition(TransitionError::Validation(e)) => e.to_string(),
            EngineError::Transition(TransitionError::NotAFilterField(e)) => {
                format!("{e} cannot be edited")
            }
            EngineError::Transition(TransitionError::InvalidTransition(_)) => {
                messages::UNKNOWN_COMMAND.to_string()
            }
            EngineError::Transition(TransitionError::IncompleteDraft(e)) => {
                error!(error = %e, "listing schema produced an incomplete draft");
                messages::GENERIC_ERROR.to_string()
            }
        };
        self.say(update, &text).await;
    }

    async fn storage_error(&self, update: &ChatUpdate, error: &DbError) {
        error!(user_id = update.user_id, %error, "storage operation failed");
        self.say(update, messages::GENERIC_ERROR).await;
    }

    async fn say(&self, update: &ChatUpdate, text: &str) {
        if let Err(e) = self.inner.transport.send_message(update.chat_id, text).await {
            warn!(chat_id = update.chat_id, error = %e, "reply not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::RecordingTransport;
    use crate::conversation::InMemorySessionStore;
    use crate::fields::{FILTER_CREATE, LISTING_CREATE};

    fn build(db: &Database) -> (Dispatcher, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let engine = ConversationEngine::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(db.clone()),
        );
        let dispatcher = Dispatcher::new(db.clone(), engine, transport.clone());
        (dispatcher, transport)
    }

    fn text_update(user_id: i64, text: &str) -> ChatUpdate {
        ChatUpdate {
            user_id,
            chat_id: user_id,
            username: Some(format!("user{user_id}")),
            text: Some(text.to_string()),
            photo_file_id: None,
        }
    }

    fn photo_update(user_id: i64) -> ChatUpdate {
        ChatUpdate {
            user_id,
            chat_id: user_id,
            username: None,
            text: None,
            photo_file_id: Some("file-1".to_string()),
        }
    }

    async fn drive(dispatcher: &Dispatcher, user_id: i64, lines: &[&str]) {
        for line in lines {
            dispatcher.handle_update(text_update(user_id, line)).await;
        }
    }

    #[tokio::test]
    async fn filter_creation_end_to_end() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/new_filter")).await;
        // answer every field, then confirm
        let sentinels = vec!["-"; FILTER_CREATE.len() - 2];
        drive(&dispatcher, 1, &["downtown"]).await;
        drive(&dispatcher, 1, &sentinels).await;
        drive(&dispatcher, 1, &["yes"]).await;

        let filters = db.list_filters(1).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].name.as_deref(), Some("downtown"));

        let texts = transport.texts_to(1);
        assert!(texts.last().unwrap().contains("Filter saved"));
        // the confirmation prompt included a summary
        assert!(texts.iter().any(|t| t.contains("name: downtown")));
    }

    #[tokio::test]
    async fn declining_confirmation_saves_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/new_filter")).await;
        let sentinels = vec!["-"; FILTER_CREATE.len() - 1];
        drive(&dispatcher, 1, &sentinels).await;
        drive(&dispatcher, 1, &["no"]).await;

        assert!(db.list_filters(1).unwrap().is_empty());
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::DISCARDED);
    }

    #[tokio::test]
    async fn invalid_answer_reprompts_without_advancing() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/new_filter")).await;
        drive(&dispatcher, 1, &["x", "apartment", "rent", "-", "-"]).await;
        // now at min_price
        dispatcher.handle_update(text_update(1, "cheap")).await;

        let texts = transport.texts_to(1);
        assert!(texts.last().unwrap().contains("number is required"));
        // the corrected answer is accepted and moves to max_price
        dispatcher.handle_update(text_update(1, "500")).await;
        assert!(transport.texts_to(1).last().unwrap().contains("maximum price"));
    }

    #[tokio::test]
    async fn unauthorized_listing_attempt_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/new_listing")).await;
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_publish_notifies_matching_subscribers() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        db.set_admin(1, true).unwrap();

        // subscriber 2 wants Moscow rentals
        db.create_filter(NewFilter {
            owner_id: 2,
            city: Some("Moscow".to_string()),
            deal_type: Some("rent".to_string()),
            is_active: true,
            ..NewFilter::default()
        })
        .unwrap();
        // subscriber 3 wants Kazan
        db.create_filter(NewFilter {
            owner_id: 3,
            city: Some("Kazan".to_string()),
            is_active: true,
            ..NewFilter::default()
        })
        .unwrap();

        dispatcher.handle_update(text_update(1, "/new_listing")).await;
        let answers = [
            "apartment", "rent", "1200", "Moscow", "-", "-", "-", "-", "2", "-", "-", "-", "-",
            "-", "-", "-",
        ];
        assert_eq!(answers.len(), LISTING_CREATE.len() - 1);
        drive(&dispatcher, 1, &answers).await;
        // photo phase: one photo, then done
        dispatcher.handle_update(photo_update(1)).await;
        dispatcher.handle_update(text_update(1, "/done")).await;

        let listings = db.list_listing_ids(0, 10).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(db.photo_count(listings[0]).unwrap(), 1);

        // subscriber 2 got the card, subscriber 3 did not
        assert_eq!(transport.texts_to(2).len(), 1);
        assert!(transport.texts_to(2)[0].contains("Listing #"));
        assert!(transport.texts_to(3).is_empty());

        // one view counted for the one delivered notification
        assert_eq!(db.listing_stats(listings[0]).unwrap().views, 1);
        assert!(transport
            .texts_to(1)
            .last()
            .unwrap()
            .contains("1 subscriber(s) notified"));
    }

    #[tokio::test]
    async fn failed_notifications_do_not_block_publishing() {
        let db = Database::open_in_memory().unwrap();
        let transport = Arc::new(RecordingTransport {
            fail_sends: true,
            ..RecordingTransport::new()
        });
        let engine = ConversationEngine::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(db.clone()),
        );
        let dispatcher = Dispatcher::new(db.clone(), engine, transport.clone());
        db.set_admin(1, true).unwrap();
        db.create_filter(NewFilter {
            owner_id: 2,
            is_active: true,
            ..NewFilter::default()
        })
        .unwrap();

        dispatcher.handle_update(text_update(1, "/new_listing")).await;
        let answers = [
            "apartment", "rent", "1200", "Moscow", "-", "-", "-", "-", "2", "-", "-", "-", "-",
            "-", "-", "-",
        ];
        drive(&dispatcher, 1, &answers).await;
        dispatcher.handle_update(text_update(1, "/done")).await;

        // the listing stands even though no message could be delivered
        let listings = db.list_listing_ids(0, 10).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(db.listing_stats(listings[0]).unwrap().views, 0);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn search_sends_card_or_nothing_found() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        db.create_listing(&NewListing {
            contact: "@seller".to_string(),
            property_type: "apartment".to_string(),
            deal_type: "rent".to_string(),
            price: 900,
            city: Some("Moscow".to_string()),
            area: None,
            street: None,
            house_number: None,
            apartment_number: None,
            rooms: None,
            balcony: None,
            renovated: None,
            total_area: None,
            floor: None,
            total_floors: None,
            deposit: None,
            description: None,
        })
        .unwrap();

        let hit = db
            .create_filter(NewFilter {
                owner_id: 1,
                city: Some("Moscow".to_string()),
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();
        let miss = db
            .create_filter(NewFilter {
                owner_id: 1,
                city: Some("Sochi".to_string()),
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();

        dispatcher
            .handle_update(text_update(1, &format!("/search {}", hit.id)))
            .await;
        assert!(transport.texts_to(1).last().unwrap().contains("Contact: @seller"));

        dispatcher
            .handle_update(text_update(1, &format!("/search {}", miss.id)))
            .await;
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::NOTHING_FOUND);
    }

    #[tokio::test]
    async fn search_leads_with_a_photo_when_one_exists() {
        use crate::bot::testing::Sent;

        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        let listing = db
            .create_listing(&NewListing {
                contact: "@seller".to_string(),
                property_type: "house".to_string(),
                deal_type: "sale".to_string(),
                price: 90_000,
                city: None,
                area: None,
                street: None,
                house_number: None,
                apartment_number: None,
                rooms: None,
                balcony: None,
                renovated: None,
                total_area: None,
                floor: None,
                total_floors: None,
                deposit: None,
                description: None,
            })
            .unwrap();
        db.add_photo(listing.id, b"front").unwrap();

        let filter = db
            .create_filter(NewFilter {
                owner_id: 1,
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();
        dispatcher
            .handle_update(text_update(1, &format!("/search {}", filter.id)))
            .await;

        let sent = transport.sent();
        assert!(matches!(
            sent.last().unwrap(),
            Sent::Photo { chat_id: 1, caption } if caption.contains("Contact: @seller")
        ));
    }

    #[tokio::test]
    async fn search_rejects_foreign_filters() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        let foreign = db
            .create_filter(NewFilter {
                owner_id: 2,
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();

        dispatcher
            .handle_update(text_update(1, &format!("/search {}", foreign.id)))
            .await;
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::NOT_YOUR_FILTER);
    }

    #[tokio::test]
    async fn field_value_form_updates_one_column() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        let filter = db
            .create_filter(NewFilter {
                owner_id: 1,
                min_price: Some(100),
                is_active: true,
                ..NewFilter::default()
            })
            .unwrap();

        dispatcher
            .handle_update(text_update(1, &format!("/update_filter {}", filter.id)))
            .await;
        assert!(transport.texts_to(1).last().unwrap().contains("Which field"));

        dispatcher
            .handle_update(text_update(1, "max_price: 2500"))
            .await;
        assert!(transport.texts_to(1).last().unwrap().contains("updated"));

        let stored = db.get_filter(filter.id).unwrap();
        assert_eq!(stored.max_price, Some(2500));
        assert_eq!(stored.min_price, Some(100));
    }

    #[tokio::test]
    async fn cancel_mid_conversation_leaks_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/new_filter")).await;
        drive(&dispatcher, 1, &["half-done", "apartment"]).await;
        dispatcher.handle_update(text_update(1, "/cancel")).await;

        assert!(db.list_filters(1).unwrap().is_empty());
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::CANCELLED);

        // a later answer is no longer part of any conversation
        dispatcher.handle_update(text_update(1, "rent")).await;
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn admin_commands_require_the_admin_bit() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.handle_update(text_update(1, "/register_admin 2")).await;
        assert_eq!(transport.texts_to(1).last().unwrap(), messages::UNAUTHORIZED);
        assert!(!db.is_admin(2).unwrap());

        db.set_admin(1, true).unwrap();
        dispatcher.handle_update(text_update(1, "/register_admin 2")).await;
        assert!(db.is_admin(2).unwrap());

        dispatcher.handle_update(text_update(1, "/unregister_admin 2")).await;
        assert!(!db.is_admin(2).unwrap());
    }

    #[tokio::test]
    async fn favorites_round_trip_with_counter() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        let listing = db
            .create_listing(&NewListing {
                contact: "@seller".to_string(),
                property_type: "room".to_string(),
                deal_type: "rent".to_string(),
                price: 300,
                city: None,
                area: None,
                street: None,
                house_number: None,
                apartment_number: None,
                rooms: None,
                balcony: None,
                renovated: None,
                total_area: None,
                floor: None,
                total_floors: None,
                deposit: None,
                description: None,
            })
            .unwrap();

        dispatcher
            .handle_update(text_update(1, &format!("/favorite {}", listing.id)))
            .await;
        assert_eq!(db.list_favorites(1).unwrap().len(), 1);
        assert_eq!(db.listing_stats(listing.id).unwrap().favorites, 1);

        dispatcher.handle_update(text_update(1, "/favorites")).await;
        assert!(transport
            .texts_to(1)
            .last()
            .unwrap()
            .contains(&listing.id.to_string()));

        dispatcher
            .handle_update(text_update(1, &format!("/unfavorite {}", listing.id)))
            .await;
        assert!(db.list_favorites(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_command_reports_counters() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);
        let listing = db
            .create_listing(&NewListing {
                contact: "@seller".to_string(),
                property_type: "apartment".to_string(),
                deal_type: "rent".to_string(),
                price: 700,
                city: None,
                area: None,
                street: None,
                house_number: None,
                apartment_number: None,
                rooms: None,
                balcony: None,
                renovated: None,
                total_area: None,
                floor: None,
                total_floors: None,
                deposit: None,
                description: None,
            })
            .unwrap();
        db.increment_stat(listing.id, StatCounter::Views).unwrap();
        db.increment_stat(listing.id, StatCounter::Views).unwrap();

        dispatcher
            .handle_update(text_update(1, &format!("/stats {}", listing.id)))
            .await;
        assert!(transport.texts_to(1).last().unwrap().contains("Views: 2"));

        dispatcher.handle_update(text_update(1, "/stats 999")).await;
        assert_eq!(
            transport.texts_to(1).last().unwrap(),
            messages::LISTING_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn dispatch_preserves_per_user_order() {
        let db = Database::open_in_memory().unwrap();
        let (dispatcher, transport) = build(&db);

        dispatcher.dispatch(text_update(1, "/new_filter")).await;
        dispatcher.dispatch(text_update(1, "ordered name")).await;
        dispatcher.dispatch(text_update(1, "/cancel")).await;

        // wait for the worker to drain
        for _ in 0..50 {
            if transport.texts_to(1).len() >= 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let texts = transport.texts_to(1);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("name for the filter"));
        assert!(texts[1].contains("property type"));
        assert_eq!(texts[2], messages::CANCELLED);
    }
}
