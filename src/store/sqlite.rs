//! SQLite session store
//!
//! Persists sessions relationally: one row per session (config, status,
//! statistics), one row per page result, and child tables for extracted
//! links and images. Timestamps are stored as RFC 3339 text.

use super::{SessionStore, SessionSummary, StoreError, StoreResult};
use crate::config::CrawlConfig;
use crate::session::{CrawlSession, PageOutcome, PageResult, SessionId, SessionStatus, Stats};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id                   TEXT PRIMARY KEY,
    seed_url             TEXT NOT NULL,
    max_depth            INTEGER NOT NULL,
    max_pages            INTEGER NOT NULL,
    concurrency          INTEGER NOT NULL,
    delay_millis         INTEGER NOT NULL,
    follow_external      INTEGER NOT NULL,
    respect_robots       INTEGER NOT NULL,
    user_agent           TEXT NOT NULL,
    timeout_seconds      INTEGER NOT NULL,
    file_types           TEXT NOT NULL,
    include_pattern      TEXT,
    exclude_pattern      TEXT,
    status               TEXT NOT NULL,
    fault                TEXT,
    started_at           TEXT NOT NULL,
    finished_at          TEXT,
    total_pages          INTEGER NOT NULL,
    total_links          INTEGER NOT NULL,
    error_count          INTEGER NOT NULL,
    response_time_sum_ms INTEGER NOT NULL,
    total_time_ms        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id       TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    seq              INTEGER NOT NULL,
    url              TEXT NOT NULL,
    depth            INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    crawled_at       TEXT NOT NULL,
    status_code      INTEGER,
    content_type     TEXT,
    content_length   INTEGER,
    last_modified    TEXT,
    title            TEXT,
    description      TEXT,
    page_text        TEXT,
    error            TEXT
);

CREATE TABLE IF NOT EXISTS page_links (
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    url     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS page_images (
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    url     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_session ON pages(session_id, seq);
CREATE INDEX IF NOT EXISTS idx_page_links_page ON page_links(page_id);
CREATE INDEX IF NOT EXISTS idx_page_images_page ON page_images(page_id);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the session database at the given path
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database; handy for tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SessionStore for SqliteStore {
    fn save(&self, session: &CrawlSession) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Replace wholesale: sessions are immutable after reaching the
        // store, so a re-save only happens for the same content
        tx.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session.id.as_str()],
        )?;

        tx.execute(
            "INSERT INTO sessions (
                id, seed_url, max_depth, max_pages, concurrency, delay_millis,
                follow_external, respect_robots, user_agent, timeout_seconds,
                file_types, include_pattern, exclude_pattern,
                status, fault, started_at, finished_at,
                total_pages, total_links, error_count, response_time_sum_ms, total_time_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                session.id.as_str(),
                session.config.seed_url,
                session.config.max_depth,
                session.config.max_pages,
                session.config.concurrency,
                session.config.delay_millis,
                session.config.follow_external as i64,
                session.config.respect_robots as i64,
                session.config.user_agent,
                session.config.timeout_seconds,
                session.config.file_types.join(","),
                session.config.include_pattern,
                session.config.exclude_pattern,
                session.status.as_str(),
                session.fault,
                session.started_at.to_rfc3339(),
                session.finished_at.map(|t| t.to_rfc3339()),
                session.stats.total_pages,
                session.stats.total_links,
                session.stats.error_count,
                session.stats.response_time_sum_ms,
                session.stats.total_time_ms,
            ],
        )?;

        for (seq, result) in session.results.iter().enumerate() {
            insert_page(&tx, session.id.as_str(), seq as i64, result)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &SessionId) -> StoreResult<Option<CrawlSession>> {
        let conn = self.conn.lock().unwrap();

        let session = conn
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id.as_str()],
                session_from_row,
            )
            .optional()?;

        let mut session = match session {
            None => return Ok(None),
            Some(Ok(s)) => s,
            Some(Err(e)) => return Err(StoreError::Corrupt(e)),
        };

        let mut stmt = conn.prepare(
            "SELECT id, url, depth, response_time_ms, crawled_at, status_code,
                    content_type, content_length, last_modified, title,
                    description, page_text, error
             FROM pages WHERE session_id = ?1 ORDER BY seq",
        )?;
        let page_rows: Vec<(i64, PageRow)> = stmt
            .query_map(params![id.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, page_row(row)?))
            })?
            .collect::<Result<_, _>>()?;

        let mut link_stmt = conn.prepare("SELECT url FROM page_links WHERE page_id = ?1")?;
        let mut image_stmt = conn.prepare("SELECT url FROM page_images WHERE page_id = ?1")?;

        for (page_id, row) in page_rows {
            let links: Vec<String> = link_stmt
                .query_map(params![page_id], |r| r.get(0))?
                .collect::<Result<_, _>>()?;
            let images: Vec<String> = image_stmt
                .query_map(params![page_id], |r| r.get(0))?
                .collect::<Result<_, _>>()?;

            session
                .results
                .push(row.into_result(links, images).map_err(StoreError::Corrupt)?);
        }

        Ok(Some(session))
    }

    fn list(&self) -> StoreResult<Vec<SessionSummary>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, seed_url, status, started_at, finished_at,
                    total_pages, total_links, error_count, response_time_sum_ms, total_time_ms
             FROM sessions ORDER BY started_at DESC",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                let status_str: String = row.get("status")?;
                let started_str: String = row.get("started_at")?;
                let finished_str: Option<String> = row.get("finished_at")?;
                Ok((
                    row.get::<_, String>("id")?,
                    row.get::<_, String>("seed_url")?,
                    status_str,
                    started_str,
                    finished_str,
                    stats_from_row(row)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        summaries
            .into_iter()
            .map(|(id, seed_url, status, started, finished, stats)| {
                Ok(SessionSummary {
                    id: SessionId::from(id),
                    seed_url,
                    status: parse_status(&status)?,
                    started_at: parse_timestamp(&started)?,
                    finished_at: finished.as_deref().map(parse_timestamp).transpose()?,
                    stats,
                })
            })
            .collect()
    }

    fn delete(&self, id: &SessionId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])?;
        Ok(affected > 0)
    }
}

fn insert_page(
    tx: &rusqlite::Transaction<'_>,
    session_id: &str,
    seq: i64,
    result: &PageResult,
) -> StoreResult<()> {
    let (status_code, content_type, content_length, last_modified, title, description, text, error) =
        match &result.outcome {
            PageOutcome::Success {
                title,
                description,
                text,
                status_code,
                content_type,
                content_length,
                last_modified,
                ..
            } => (
                Some(*status_code),
                content_type.clone(),
                *content_length,
                last_modified.clone(),
                title.clone(),
                description.clone(),
                text.clone(),
                None,
            ),
            PageOutcome::Error {
                message,
                status_code,
            } => (
                *status_code,
                None,
                None,
                None,
                None,
                None,
                None,
                Some(message.clone()),
            ),
        };

    tx.execute(
        "INSERT INTO pages (
            session_id, seq, url, depth, response_time_ms, crawled_at,
            status_code, content_type, content_length, last_modified,
            title, description, page_text, error
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            session_id,
            seq,
            result.url,
            result.depth,
            result.response_time_ms,
            result.crawled_at.to_rfc3339(),
            status_code,
            content_type,
            content_length,
            last_modified,
            title,
            description,
            text,
            error,
        ],
    )?;

    let page_id = tx.last_insert_rowid();

    if let PageOutcome::Success { links, images, .. } = &result.outcome {
        for link in links {
            tx.execute(
                "INSERT INTO page_links (page_id, url) VALUES (?1, ?2)",
                params![page_id, link],
            )?;
        }
        for image in images {
            tx.execute(
                "INSERT INTO page_images (page_id, url) VALUES (?1, ?2)",
                params![page_id, image],
            )?;
        }
    }

    Ok(())
}

/// Intermediate page row, before links/images are attached
struct PageRow {
    url: String,
    depth: u32,
    response_time_ms: u64,
    crawled_at: String,
    status_code: Option<u16>,
    content_type: Option<String>,
    content_length: Option<u64>,
    last_modified: Option<String>,
    title: Option<String>,
    description: Option<String>,
    text: Option<String>,
    error: Option<String>,
}

impl PageRow {
    fn into_result(
        self,
        links: Vec<String>,
        images: Vec<String>,
    ) -> Result<PageResult, String> {
        let crawled_at = parse_timestamp(&self.crawled_at).map_err(|e| e.to_string())?;

        let outcome = match self.error {
            Some(message) => PageOutcome::Error {
                message,
                status_code: self.status_code,
            },
            None => PageOutcome::Success {
                title: self.title,
                description: self.description,
                text: self.text,
                links,
                images,
                status_code: self
                    .status_code
                    .ok_or_else(|| format!("page {} has no status code", self.url))?,
                content_type: self.content_type,
                content_length: self.content_length,
                last_modified: self.last_modified,
            },
        };

        Ok(PageResult {
            url: self.url,
            depth: self.depth,
            response_time_ms: self.response_time_ms,
            crawled_at,
            outcome,
        })
    }
}

fn page_row(row: &Row<'_>) -> rusqlite::Result<PageRow> {
    Ok(PageRow {
        url: row.get("url")?,
        depth: row.get("depth")?,
        response_time_ms: row.get("response_time_ms")?,
        crawled_at: row.get("crawled_at")?,
        status_code: row.get("status_code")?,
        content_type: row.get("content_type")?,
        content_length: row.get("content_length")?,
        last_modified: row.get("last_modified")?,
        title: row.get("title")?,
        description: row.get("description")?,
        text: row.get("page_text")?,
        error: row.get("error")?,
    })
}

/// Builds a session (without results) from a full sessions row
///
/// Returns the field-level problem as an inner `Err` so the rusqlite
/// row-mapping signature stays simple.
fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Result<CrawlSession, String>> {
    let file_types: String = row.get("file_types")?;
    let config = CrawlConfig {
        seed_url: row.get("seed_url")?,
        max_depth: row.get("max_depth")?,
        max_pages: row.get("max_pages")?,
        concurrency: row.get("concurrency")?,
        delay_millis: row.get("delay_millis")?,
        follow_external: row.get::<_, i64>("follow_external")? != 0,
        respect_robots: row.get::<_, i64>("respect_robots")? != 0,
        user_agent: row.get("user_agent")?,
        timeout_seconds: row.get("timeout_seconds")?,
        file_types: if file_types.is_empty() {
            vec![]
        } else {
            file_types.split(',').map(|s| s.to_string()).collect()
        },
        include_pattern: row.get("include_pattern")?,
        exclude_pattern: row.get("exclude_pattern")?,
    };

    let id: String = row.get("id")?;
    let status_str: String = row.get("status")?;
    let started_str: String = row.get("started_at")?;
    let finished_str: Option<String> = row.get("finished_at")?;
    let fault: Option<String> = row.get("fault")?;
    let stats = stats_from_row(row)?;

    let session = (move || -> Result<CrawlSession, String> {
        Ok(CrawlSession {
            id: SessionId::from(id),
            config,
            results: Vec::new(),
            stats,
            started_at: parse_timestamp(&started_str).map_err(|e| e.to_string())?,
            finished_at: finished_str
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .map_err(|e| e.to_string())?,
            status: parse_status(&status_str).map_err(|e| e.to_string())?,
            fault,
        })
    })();

    Ok(session)
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<Stats> {
    let mut stats = Stats {
        total_pages: row.get("total_pages")?,
        total_links: row.get("total_links")?,
        error_count: row.get("error_count")?,
        response_time_sum_ms: row.get("response_time_sum_ms")?,
        total_time_ms: row.get("total_time_ms")?,
        ..Stats::default()
    };

    if stats.total_pages > 0 {
        stats.avg_response_time_ms = stats.response_time_sum_ms as f64 / stats.total_pages as f64;
        stats.success_rate =
            (stats.total_pages - stats.error_count) as f64 / stats.total_pages as f64 * 100.0;
    }

    Ok(stats)
}

fn parse_status(s: &str) -> Result<SessionStatus, StoreError> {
    SessionStatus::parse(s).ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", s)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}
