//! In-memory session store
//!
//! Keeps completed sessions in process memory, mirroring the reference
//! deployment where sessions live only as long as the server. Suitable
//! for embedding and tests; use [`super::SqliteStore`] to keep sessions
//! across restarts.

use super::{SessionStore, SessionSummary, StoreResult};
use crate::session::{CrawlSession, SessionId};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<CrawlSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, session: &CrawlSession) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().unwrap();

        if let Some(existing) = sessions.iter_mut().find(|s| s.id == session.id) {
            *existing = session.clone();
        } else {
            sessions.push(session.clone());
        }

        Ok(())
    }

    fn get(&self, id: &SessionId) -> StoreResult<Option<CrawlSession>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.iter().find(|s| &s.id == id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<SessionSummary>> {
        let sessions = self.sessions.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = sessions.iter().map(SessionSummary::of).collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }

    fn delete(&self, id: &SessionId) -> StoreResult<bool> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| &s.id != id);
        Ok(sessions.len() < before)
    }
}
