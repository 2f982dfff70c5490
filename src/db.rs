//! SQLite storage layer.
//!
//! A single connection behind `Arc<Mutex<..>>` keeps the handle cheaply
//! cloneable across worker tasks and the HTTP surface. All statements are
//! parameterized; column names only ever come from typed enums.

mod schema;

pub use schema::{
    Favorite, FilterSpec, FilterSummary, IncompleteDraft, Listing, ListingState, NewFilter,
    NewListing, StatCounter, Stats, SCHEMA,
};

use crate::fields::{update_descriptor, FieldKey, FieldValue};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("filter {0} not found")]
    FilterNotFound(i64),
    #[error("listing {0} not found")]
    ListingNotFound(i64),
    #[error("listing {listing_id} has no photo at index {index}")]
    PhotoNotFound { listing_id: i64, index: i64 },
    #[error("{0} is not an editable filter field")]
    NotAFilterField(FieldKey),
}

pub type DbResult<T> = Result<T, DbError>;

const FILTER_COLUMNS: &str = "id, owner_id, name, property_type, deal_type, city, areas, \
     min_price, max_price, min_rooms, max_rooms, min_total_area, max_total_area, \
     balcony, renovated, min_deposit, max_deposit, floor, total_floors, is_active";

const LISTING_COLUMNS: &str = "id, state, contact, property_type, deal_type, price, city, area, \
     street, house_number, apartment_number, rooms, balcony, renovated, total_area, \
     floor, total_floors, deposit, description, created_at, updated_at";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // --- users ---

    /// Insert the user row if this is the first contact. Idempotent.
    pub fn ensure_user(&self, user_id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT OR IGNORE INTO users (id) VALUES (?1)", params![user_id])?;
        Ok(())
    }

    pub fn is_admin(&self, user_id: i64) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let flag: Option<bool> = conn
            .query_row(
                "SELECT is_admin FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(false))
    }

    pub fn set_admin(&self, user_id: i64, is_admin: bool) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, is_admin) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET is_admin = excluded.is_admin",
            params![user_id, is_admin],
        )?;
        info!(user_id, is_admin, "admin flag updated");
        Ok(())
    }

    // --- filters ---

    pub fn create_filter(&self, new: NewFilter) -> DbResult<FilterSpec> {
        let areas_json = match &new.areas {
            Some(areas) => Some(serde_json::to_string(areas).map_err(|e| {
                DbError::Sqlite(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
            })?),
            None => None,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO filters (owner_id, name, property_type, deal_type, city, areas,
                 min_price, max_price, min_rooms, max_rooms, min_total_area, max_total_area,
                 balcony, renovated, min_deposit, max_deposit, floor, total_floors,
                 is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20)",
            params![
                new.owner_id,
                new.name,
                new.property_type,
                new.deal_type,
                new.city,
                areas_json,
                new.min_price,
                new.max_price,
                new.min_rooms,
                new.max_rooms,
                new.min_total_area,
                new.max_total_area,
                new.balcony,
                new.renovated,
                new.min_deposit,
                new.max_deposit,
                new.floor,
                new.total_floors,
                new.is_active,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(filter_id = id, owner_id = new.owner_id, "filter created");
        Ok(FilterSpec {
            id,
            owner_id: new.owner_id,
            name: new.name,
            property_type: new.property_type,
            deal_type: new.deal_type,
            city: new.city,
            areas: new.areas,
            min_price: new.min_price,
            max_price: new.max_price,
            min_rooms: new.min_rooms,
            max_rooms: new.max_rooms,
            min_total_area: new.min_total_area,
            max_total_area: new.max_total_area,
            balcony: new.balcony,
            renovated: new.renovated,
            min_deposit: new.min_deposit,
            max_deposit: new.max_deposit,
            floor: new.floor,
            total_floors: new.total_floors,
            is_active: new.is_active,
        })
    }

    pub fn get_filter(&self, filter_id: i64) -> DbResult<FilterSpec> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {FILTER_COLUMNS} FROM filters WHERE id = ?1"),
            params![filter_id],
            map_filter,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::FilterNotFound(filter_id),
            other => DbError::Sqlite(other),
        })
    }

    /// All filters owned by a user, oldest first.
    pub fn list_filters(&self, owner_id: i64) -> DbResult<Vec<FilterSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name FROM filters WHERE owner_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(FilterSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every filter with the active bit set, across all owners.
    pub fn list_active_filters(&self) -> DbResult<Vec<FilterSpec>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {FILTER_COLUMNS} FROM filters WHERE is_active = 1"))?;
        let rows = stmt.query_map([], map_filter)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Overwrite a single filter column. The column name comes from the
    /// field's static descriptor; the value is always bound, never spliced.
    pub fn update_filter_field(
        &self,
        filter_id: i64,
        field: FieldKey,
        value: Option<&FieldValue>,
    ) -> DbResult<()> {
        let descriptor = update_descriptor(field).ok_or(DbError::NotAFilterField(field))?;
        let bound: SqlValue = match value {
            None => SqlValue::Null,
            Some(FieldValue::Text(s)) => SqlValue::Text(s.clone()),
            Some(FieldValue::Int(n)) => SqlValue::Integer(*n),
            Some(FieldValue::Bool(b)) => SqlValue::Integer(i64::from(*b)),
            Some(FieldValue::TextSet(items)) => SqlValue::Text(
                serde_json::to_string(items).map_err(|e| {
                    DbError::Sqlite(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
                })?,
            ),
        };
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE filters SET {} = ?1 WHERE id = ?2",
                descriptor.key.as_str()
            ),
            params![bound, filter_id],
        )?;
        if changed == 0 {
            return Err(DbError::FilterNotFound(filter_id));
        }
        debug!(filter_id, field = %field, "filter field updated");
        Ok(())
    }

    pub fn delete_filter(&self, filter_id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM filters WHERE id = ?1", params![filter_id])?;
        if changed == 0 {
            return Err(DbError::FilterNotFound(filter_id));
        }
        info!(filter_id, "filter deleted");
        Ok(())
    }

    // --- listings ---

    pub fn create_listing(&self, new: &NewListing) -> DbResult<Listing> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listings (state, contact, property_type, deal_type, price, city, area,
                 street, house_number, apartment_number, rooms, balcony, renovated, total_area,
                 floor, total_floors, deposit, description, created_at, updated_at)
             VALUES ('active', ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17, ?18, ?18)",
            params![
                new.contact,
                new.property_type,
                new.deal_type,
                new.price,
                new.city,
                new.area,
                new.street,
                new.house_number,
                new.apartment_number,
                new.rooms,
                new.balcony,
                new.renovated,
                new.total_area,
                new.floor,
                new.total_floors,
                new.deposit,
                new.description,
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT OR IGNORE INTO listing_stats (listing_id) VALUES (?1)",
            params![id],
        )?;
        info!(listing_id = id, "listing created");
        Ok(Listing {
            id,
            state: ListingState::Active,
            contact: new.contact.clone(),
            property_type: new.property_type.clone(),
            deal_type: new.deal_type.clone(),
            price: new.price,
            city: new.city.clone(),
            area: new.area.clone(),
            street: new.street.clone(),
            house_number: new.house_number.clone(),
            apartment_number: new.apartment_number.clone(),
            rooms: new.rooms,
            balcony: new.balcony,
            renovated: new.renovated,
            total_area: new.total_area,
            floor: new.floor,
            total_floors: new.total_floors,
            deposit: new.deposit,
            description: new.description.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_listing(&self, listing_id: i64) -> DbResult<Listing> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
            params![listing_id],
            map_listing,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ListingNotFound(listing_id),
            other => DbError::Sqlite(other),
        })
    }

    /// Page through listing ids, newest first.
    pub fn list_listing_ids(&self, offset: i64, limit: i64) -> DbResult<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM listings ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_listing_state(&self, listing_id: i64, state: ListingState) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE listings SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.as_str(), Utc::now().to_rfc3339(), listing_id],
        )?;
        if changed == 0 {
            return Err(DbError::ListingNotFound(listing_id));
        }
        info!(listing_id, state = %state, "listing state changed");
        Ok(())
    }

    /// Delete a listing along with its photos, stats and favorites rows.
    pub fn delete_listing(&self, listing_id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM listing_photos WHERE listing_id = ?1",
            params![listing_id],
        )?;
        conn.execute(
            "DELETE FROM favorites WHERE listing_id = ?1",
            params![listing_id],
        )?;
        conn.execute(
            "DELETE FROM listing_stats WHERE listing_id = ?1",
            params![listing_id],
        )?;
        let changed = conn.execute("DELETE FROM listings WHERE id = ?1", params![listing_id])?;
        if changed == 0 {
            return Err(DbError::ListingNotFound(listing_id));
        }
        info!(listing_id, "listing deleted");
        Ok(())
    }

    /// Run a prepared id query assembled by the search builder. The SQL text
    /// is built from static fragments only; all values arrive here as params.
    pub(crate) fn query_listing_ids(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- photos ---

    pub fn add_photo(&self, listing_id: i64, data: &[u8]) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listing_photos (listing_id, position, data)
             VALUES (?1,
                 (SELECT COALESCE(MAX(position), -1) + 1 FROM listing_photos
                  WHERE listing_id = ?1),
                 ?2)",
            params![listing_id, data],
        )?;
        Ok(())
    }

    pub fn photo_count(&self, listing_id: i64) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM listing_photos WHERE listing_id = ?1",
            params![listing_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Fetch the photo at a zero-based position index.
    pub fn get_photo(&self, listing_id: i64, index: i64) -> DbResult<Vec<u8>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT data FROM listing_photos WHERE listing_id = ?1
             ORDER BY position LIMIT 1 OFFSET ?2",
            params![listing_id, index],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::PhotoNotFound { listing_id, index },
            other => DbError::Sqlite(other),
        })
    }

    // --- stats ---

    /// Bump one counter for a listing and in the bot-wide aggregate.
    pub fn increment_stat(&self, listing_id: i64, counter: StatCounter) -> DbResult<()> {
        let column = counter.column();
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!("UPDATE listing_stats SET {column} = {column} + 1 WHERE listing_id = ?1"),
            params![listing_id],
        )?;
        if changed == 0 {
            return Err(DbError::ListingNotFound(listing_id));
        }
        conn.execute(
            &format!("UPDATE global_stats SET {column} = {column} + 1 WHERE id = 1"),
            [],
        )?;
        Ok(())
    }

    pub fn listing_stats(&self, listing_id: i64) -> DbResult<Stats> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT views, favorites, likes FROM listing_stats WHERE listing_id = ?1",
            params![listing_id],
            map_stats,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ListingNotFound(listing_id),
            other => DbError::Sqlite(other),
        })
    }

    pub fn global_stats(&self) -> DbResult<Stats> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row(
            "SELECT views, favorites, likes FROM global_stats WHERE id = 1",
            [],
            map_stats,
        )?)
    }

    // --- favorites ---

    /// Idempotent: re-adding an existing favorite is a no-op.
    pub fn add_favorite(&self, user_id: i64, listing_id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO favorites (user_id, listing_id) VALUES (?1, ?2)",
            params![user_id, listing_id],
        )?;
        Ok(())
    }

    pub fn remove_favorite(&self, user_id: i64, listing_id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
            params![user_id, listing_id],
        )?;
        Ok(())
    }

    pub fn list_favorites(&self, user_id: i64) -> DbResult<Vec<Favorite>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, listing_id FROM favorites WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Favorite {
                id: row.get(0)?,
                listing_id: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_stats(row: &Row<'_>) -> rusqlite::Result<Stats> {
    Ok(Stats {
        views: row.get(0)?,
        favorites: row.get(1)?,
        likes: row.get(2)?,
    })
}

fn map_filter(row: &Row<'_>) -> rusqlite::Result<FilterSpec> {
    let areas_json: Option<String> = row.get(6)?;
    Ok(FilterSpec {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        property_type: row.get(3)?,
        deal_type: row.get(4)?,
        city: row.get(5)?,
        areas: areas_json.and_then(|json| serde_json::from_str(&json).ok()),
        min_price: row.get(7)?,
        max_price: row.get(8)?,
        min_rooms: row.get(9)?,
        max_rooms: row.get(10)?,
        min_total_area: row.get(11)?,
        max_total_area: row.get(12)?,
        balcony: row.get(13)?,
        renovated: row.get(14)?,
        min_deposit: row.get(15)?,
        max_deposit: row.get(16)?,
        floor: row.get(17)?,
        total_floors: row.get(18)?,
        is_active: row.get(19)?,
    })
}

fn map_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let state_text: String = row.get(1)?;
    Ok(Listing {
        id: row.get(0)?,
        state: state_text.parse().unwrap_or(ListingState::Active),
        contact: row.get(2)?,
        property_type: row.get(3)?,
        deal_type: row.get(4)?,
        price: row.get(5)?,
        city: row.get(6)?,
        area: row.get(7)?,
        street: row.get(8)?,
        house_number: row.get(9)?,
        apartment_number: row.get(10)?,
        rooms: row.get(11)?,
        balcony: row.get(12)?,
        renovated: row.get(13)?,
        total_area: row.get(14)?,
        floor: row.get(15)?,
        total_floors: row.get(16)?,
        deposit: row.get(17)?,
        description: row.get(18)?,
        created_at: parse_datetime(&row.get::<_, String>(19)?),
        updated_at: parse_datetime(&row.get::<_, String>(20)?),
    })
}

fn parse_datetime(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
