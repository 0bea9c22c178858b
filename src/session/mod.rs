//! Crawl session aggregate
//!
//! A session owns the configuration, the append-only sequence of per-page
//! results (in completion order), the derived statistics, and the
//! lifecycle status. The coordinator appends results through a shared
//! [`SessionHandle`]; readers take consistent snapshots concurrently.

use crate::config::CrawlConfig;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Unique identifier of a crawl session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

impl SessionId {
    /// Generates a fresh session identifier
    ///
    /// The token is the first 16 hex characters of a SHA-256 over the seed
    /// URL, the creation instant, and a process-wide counter; the counter
    /// keeps identifiers distinct even for identical seeds created within
    /// the same clock tick.
    pub fn generate(seed_url: &str) -> Self {
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(seed_url.as_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hex::encode(hasher.finalize());

        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Session created, coordinator not yet running
    Pending,

    /// Coordinator is draining the frontier
    Running,

    /// Frontier exhausted or page budget reached
    Completed,

    /// External stop request honored
    Stopped,

    /// Engine-level fault terminated the session
    Error,
}

impl SessionStatus {
    /// Returns true once the session can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single fetch attempt
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// The fetch succeeded and the page was processed
    Success {
        title: Option<String>,
        description: Option<String>,
        text: Option<String>,
        links: Vec<String>,
        images: Vec<String>,
        status_code: u16,
        content_type: Option<String>,
        content_length: Option<u64>,
        last_modified: Option<String>,
    },

    /// The fetch failed; the crawl continues
    Error {
        message: String,
        status_code: Option<u16>,
    },
}

/// Record of one fetch attempt, immutable once appended to a session
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Canonical URL that was fetched
    pub url: String,

    /// Link depth from the seed (seed = 0)
    pub depth: u32,

    /// Wall-clock duration of the fetch in milliseconds
    pub response_time_ms: u64,

    /// When the fetch completed
    pub crawled_at: DateTime<Utc>,

    pub outcome: PageOutcome,
}

impl PageResult {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, PageOutcome::Error { .. })
    }

    /// Outbound links extracted from the page; empty for error results
    pub fn links(&self) -> &[String] {
        match &self.outcome {
            PageOutcome::Success { links, .. } => links,
            PageOutcome::Error { .. } => &[],
        }
    }

    pub fn title(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Success { title, .. } => title.as_deref(),
            PageOutcome::Error { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.outcome {
            PageOutcome::Success { status_code, .. } => Some(*status_code),
            PageOutcome::Error { status_code, .. } => *status_code,
        }
    }
}

/// Aggregate statistics, maintained incrementally as results arrive
///
/// Every update is O(1): running counts and the response-time sum are kept
/// directly, the derived averages are recomputed from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total_pages: u64,
    pub total_links: u64,
    pub error_count: u64,
    pub response_time_sum_ms: u64,
    pub avg_response_time_ms: f64,
    /// Percentage of results without an error; 0.0 when there are none
    pub success_rate: f64,
    /// Elapsed session time in milliseconds; final once the session ends
    pub total_time_ms: u64,
}

impl Stats {
    /// Folds one result into the running aggregates
    pub fn record(&mut self, result: &PageResult) {
        self.total_pages += 1;
        self.total_links += result.links().len() as u64;
        if result.is_error() {
            self.error_count += 1;
        }
        self.response_time_sum_ms += result.response_time_ms;

        self.avg_response_time_ms = self.response_time_sum_ms as f64 / self.total_pages as f64;
        self.success_rate =
            (self.total_pages - self.error_count) as f64 / self.total_pages as f64 * 100.0;
    }
}

/// One complete crawl run: configuration, results, statistics, lifecycle
#[derive(Debug, Clone)]
pub struct CrawlSession {
    pub id: SessionId,
    pub config: CrawlConfig,
    /// Append-only, in completion order (not discovery order)
    pub results: Vec<PageResult>,
    pub stats: Stats,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Set when `status` is `Error`
    pub fault: Option<String>,
}

impl CrawlSession {
    pub fn new(id: SessionId, config: CrawlConfig) -> Self {
        Self {
            id,
            config,
            results: Vec::new(),
            stats: Stats::default(),
            started_at: Utc::now(),
            finished_at: None,
            status: SessionStatus::Pending,
            fault: None,
        }
    }
}

/// Shared handle to a live session
///
/// The coordinator appends results and finalizes; the engine serves
/// snapshots and stop requests. All session mutation goes through the
/// single inner mutex, so concurrent appends and snapshots cannot race.
/// The stop flag lives outside the mutex: setting it never blocks on an
/// in-progress append.
pub struct SessionHandle {
    id: SessionId,
    started_at: DateTime<Utc>,
    inner: Mutex<CrawlSession>,
    stop: AtomicBool,
}

impl SessionHandle {
    pub fn new(id: SessionId, config: CrawlConfig) -> Self {
        let session = CrawlSession::new(id.clone(), config);
        let started_at = session.started_at;
        Self {
            id,
            started_at,
            inner: Mutex::new(session),
            stop: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Transitions the session from pending to running
    pub fn mark_running(&self) {
        let mut session = self.inner.lock().unwrap();
        session.status = SessionStatus::Running;
    }

    /// Appends a result and updates the statistics in one critical section
    pub fn append_result(&self, result: PageResult) {
        let mut session = self.inner.lock().unwrap();
        session.stats.record(&result);
        session.stats.total_time_ms = (Utc::now() - session.started_at)
            .num_milliseconds()
            .max(0) as u64;
        session.results.push(result);
    }

    /// Registers a stop intent; observed by the coordinator at its next
    /// loop check, never preemptively
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Moves the session to a terminal status and stamps the end time
    pub fn finalize(&self, status: SessionStatus, fault: Option<String>) {
        let mut session = self.inner.lock().unwrap();
        let finished = Utc::now();
        session.finished_at = Some(finished);
        session.stats.total_time_ms =
            (finished - session.started_at).num_milliseconds().max(0) as u64;
        session.status = status;
        session.fault = fault;
    }

    /// Returns a read-only copy, safe to call while results are appended
    pub fn snapshot(&self) -> CrawlSession {
        self.inner.lock().unwrap().clone()
    }
}
