//! Session persistence
//!
//! The engine hands a session to a [`SessionStore`] once it reaches a
//! terminal state and reads stored sessions back for status queries and
//! listings. Session lifecycle beyond that (eviction, retention) is the
//! store's concern, not the engine's.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::session::{CrawlSession, SessionId, SessionStatus, Stats};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt session record: {0}")]
    Corrupt(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Listing row for a session: what a dashboard needs, without the results
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub seed_url: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: Stats,
}

impl SessionSummary {
    pub fn of(session: &CrawlSession) -> Self {
        Self {
            id: session.id.clone(),
            seed_url: session.config.seed_url.clone(),
            status: session.status,
            started_at: session.started_at,
            finished_at: session.finished_at,
            stats: session.stats.clone(),
        }
    }
}

/// Capability for persisting and retrieving crawl sessions
pub trait SessionStore: Send + Sync {
    /// Saves a session, replacing any previous record with the same id
    fn save(&self, session: &CrawlSession) -> StoreResult<()>;

    /// Loads a full session by id
    fn get(&self, id: &SessionId) -> StoreResult<Option<CrawlSession>>;

    /// Lists stored sessions, most recently created first
    fn list(&self) -> StoreResult<Vec<SessionSummary>>;

    /// Removes a session; returns whether one existed
    fn delete(&self, id: &SessionId) -> StoreResult<bool>;
}
