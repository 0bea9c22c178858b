//! Crawl engine boundary
//!
//! [`CrawlEngine`] is the surface callers use: start a crawl from a
//! validated configuration, poll its status, request a stop, and list
//! sessions. The capabilities it depends on — fetching, robots policy,
//! session persistence — are injected, never ambient.

use crate::config::{validate, CrawlConfig};
use crate::crawler::{Coordinator, PageFetcher};
use crate::robots::RobotsPolicy;
use crate::session::{CrawlSession, SessionHandle, SessionId};
use crate::store::{SessionStore, SessionSummary};
use crate::url::UrlFilter;
use crate::{ConfigError, DriftnetError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct CrawlEngine {
    fetcher: Arc<dyn PageFetcher>,
    robots: Arc<dyn RobotsPolicy>,
    store: Arc<dyn SessionStore>,
    /// Sessions whose coordinator task is still running
    active: Arc<Mutex<HashMap<SessionId, Arc<SessionHandle>>>>,
}

impl CrawlEngine {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        robots: Arc<dyn RobotsPolicy>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            fetcher,
            robots,
            store,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validates the configuration and starts a crawl
    ///
    /// Returns as soon as the coordinator task is spawned; the crawl
    /// proceeds in the background. An invalid configuration is rejected
    /// here and no session is created. Must be called within a tokio
    /// runtime.
    pub fn start_crawl(&self, config: CrawlConfig) -> Result<SessionId, ConfigError> {
        validate(&config)?;
        let filter = UrlFilter::compile(&config)?;

        let id = SessionId::generate(&config.seed_url);
        let handle = Arc::new(SessionHandle::new(id.clone(), config.clone()));
        self.active
            .lock()
            .unwrap()
            .insert(id.clone(), Arc::clone(&handle));

        let coordinator = Coordinator::new(
            config,
            filter,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.robots),
            Arc::clone(&handle),
        );

        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let session_id = id.clone();
        tokio::spawn(async move {
            coordinator.run().await;

            let snapshot = handle.snapshot();
            if let Err(e) = store.save(&snapshot) {
                tracing::error!("failed to save session {}: {}", session_id, e);
            }
            active.lock().unwrap().remove(&session_id);
        });

        Ok(id)
    }

    /// Returns a point-in-time snapshot of a session
    ///
    /// Live sessions are answered from the running handle, terminal ones
    /// from the store.
    pub fn get_status(&self, id: &SessionId) -> Result<CrawlSession, DriftnetError> {
        if let Some(handle) = self.active.lock().unwrap().get(id) {
            return Ok(handle.snapshot());
        }

        self.store
            .get(id)?
            .ok_or_else(|| DriftnetError::SessionNotFound(id.to_string()))
    }

    /// Registers a stop intent for a running session
    ///
    /// The coordinator observes the intent at its next loop check: no new
    /// fetches are dispatched, in-flight ones finish and are recorded.
    /// Stopping an already-terminal session is a no-op success; an unknown
    /// id is an error.
    pub fn request_stop(&self, id: &SessionId) -> Result<(), DriftnetError> {
        if let Some(handle) = self.active.lock().unwrap().get(id) {
            handle.request_stop();
            return Ok(());
        }

        if self.store.get(id)?.is_some() {
            return Ok(());
        }

        Err(DriftnetError::SessionNotFound(id.to_string()))
    }

    /// Lists running and stored sessions, most recently created first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, DriftnetError> {
        let mut summaries = self.store.list()?;

        {
            let active = self.active.lock().unwrap();
            for handle in active.values() {
                let snapshot = handle.snapshot();
                // A session that finished mid-listing could show up twice;
                // the live snapshot wins
                summaries.retain(|s| s.id != snapshot.id);
                summaries.push(SessionSummary::of(&snapshot));
            }
        }

        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }
}
