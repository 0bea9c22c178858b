//! Crawl coordinator
//!
//! The coordinator owns the frontier and drives a session to a terminal
//! state: it dispatches up to `concurrency` fetches at a time through the
//! politeness governor and robots gate, turns every completion into a
//! page result (in completion order, which need not match dispatch order),
//! and feeds admitted links back into the frontier at `depth + 1`.
//!
//! Per-page fetch failures are absorbed into error results and never end
//! the crawl; only a worker task failure (a panic inside the fetcher) is
//! an engine fault that terminates the session with `Error`.

use crate::config::CrawlConfig;
use crate::crawler::fetcher::{FetchError, FetchOutcome, PageFetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::governor::Governor;
use crate::robots::RobotsPolicy;
use crate::session::{PageOutcome, PageResult, SessionHandle, SessionStatus};
use crate::url::{normalize_url, page_origin, UrlFilter};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// What a finished fetch task hands back to the coordinator
struct FetchCompletion {
    entry: FrontierEntry,
    outcome: Result<FetchOutcome, FetchError>,
    response_time_ms: u64,
}

pub struct Coordinator {
    config: CrawlConfig,
    filter: UrlFilter,
    fetcher: Arc<dyn PageFetcher>,
    governor: Governor,
    session: Arc<SessionHandle>,
}

impl Coordinator {
    pub fn new(
        config: CrawlConfig,
        filter: UrlFilter,
        fetcher: Arc<dyn PageFetcher>,
        robots: Arc<dyn RobotsPolicy>,
        session: Arc<SessionHandle>,
    ) -> Self {
        let governor = Governor::new(&config, robots);
        Self {
            config,
            filter,
            fetcher,
            governor,
            session,
        }
    }

    /// Runs the crawl to completion
    ///
    /// Returns once the session has been finalized with one of the
    /// terminal statuses: `Completed` (frontier exhausted or page budget
    /// reached), `Stopped` (stop request observed; in-flight fetches were
    /// drained and their results recorded), or `Error` (engine fault).
    pub async fn run(mut self) {
        let seed = match normalize_url(&self.config.seed_url) {
            Ok(url) => url,
            Err(e) => {
                // Validation parses the seed before a session exists, so
                // this is an invariant violation, not a user error
                self.session
                    .finalize(SessionStatus::Error, Some(format!("seed URL: {}", e)));
                return;
            }
        };

        let mut frontier = Frontier::new(self.config.max_depth);
        frontier.push(seed, 0);

        self.session.mark_running();
        tracing::info!(
            "session {} started: seed {}, depth {}, budget {}, concurrency {}",
            self.session.id(),
            self.config.seed_url,
            self.config.max_depth,
            self.config.max_pages,
            self.config.concurrency
        );

        let concurrency = self.config.concurrency as usize;
        let max_pages = self.config.max_pages as u64;
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let mut in_flight: JoinSet<FetchCompletion> = JoinSet::new();
        let mut dispatched: u64 = 0;
        let mut completed: u64 = 0;
        let mut fault: Option<String> = None;

        loop {
            if self.session.stop_requested() {
                break;
            }

            // Dispatch until the pool is full, the budget is spent, or the
            // frontier runs dry
            while in_flight.len() < concurrency
                && dispatched < max_pages
                && !self.session.stop_requested()
            {
                let Some(entry) = frontier.pop() else {
                    break;
                };

                if !self.governor.is_allowed(&entry.url).await {
                    tracing::debug!("robots disallows {}, skipping", entry.url);
                    continue;
                }

                self.governor.await_slot().await;
                dispatched += 1;

                let fetcher = Arc::clone(&self.fetcher);
                let user_agent = self.config.user_agent.clone();
                in_flight.spawn(async move {
                    let started = Instant::now();
                    let outcome = fetcher.fetch(&entry.url, &user_agent, timeout).await;
                    FetchCompletion {
                        entry,
                        outcome,
                        response_time_ms: started.elapsed().as_millis() as u64,
                    }
                });
            }

            if in_flight.is_empty() {
                // Nothing running and nothing dispatchable: done
                break;
            }

            match in_flight.join_next().await {
                Some(Ok(completion)) => {
                    self.process_completion(completion, &mut frontier);
                    completed += 1;

                    if completed % 10 == 0 {
                        tracing::info!(
                            "session {}: {} pages done, {} pending, {} in flight",
                            self.session.id(),
                            completed,
                            frontier.len(),
                            in_flight.len()
                        );
                    }
                }
                Some(Err(e)) => {
                    fault = Some(format!("fetch task failed: {}", e));
                    break;
                }
                None => break,
            }
        }

        if let Some(ref message) = fault {
            tracing::error!("session {}: engine fault: {}", self.session.id(), message);
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        } else {
            // Stop path: let in-flight fetches finish and record them
            while let Some(res) = in_flight.join_next().await {
                match res {
                    Ok(completion) => self.process_completion(completion, &mut frontier),
                    Err(e) => {
                        fault = Some(format!("fetch task failed: {}", e));
                        in_flight.abort_all();
                    }
                }
            }
        }

        let status = if fault.is_some() {
            SessionStatus::Error
        } else if self.session.stop_requested() {
            SessionStatus::Stopped
        } else {
            SessionStatus::Completed
        };

        self.session.finalize(status, fault);
        tracing::info!("session {} finished: {}", self.session.id(), status);
    }

    /// Turns a completion into a page result and enqueues admitted links
    fn process_completion(&self, completion: FetchCompletion, frontier: &mut Frontier) {
        let FetchCompletion {
            entry,
            outcome,
            response_time_ms,
        } = completion;

        let result = match outcome {
            Ok(outcome) => {
                let origin = page_origin(&entry.url);

                for link in &outcome.links {
                    match normalize_url(link) {
                        Ok(normalized) => {
                            if self.filter.admit(&normalized, &origin) {
                                frontier.push(normalized, entry.depth + 1);
                            }
                        }
                        Err(e) => {
                            tracing::debug!("discarding link {}: {}", link, e);
                        }
                    }
                }

                PageResult {
                    url: entry.url.to_string(),
                    depth: entry.depth,
                    response_time_ms,
                    crawled_at: Utc::now(),
                    outcome: PageOutcome::Success {
                        title: outcome.title,
                        description: outcome.description,
                        text: outcome.text,
                        links: outcome.links,
                        images: outcome.images,
                        status_code: outcome.status_code,
                        content_type: outcome.content_type,
                        content_length: outcome.content_length,
                        last_modified: outcome.last_modified,
                    },
                }
            }
            Err(err) => {
                tracing::debug!("fetch failed for {}: {}", entry.url, err);
                PageResult {
                    url: entry.url.to_string(),
                    depth: entry.depth,
                    response_time_ms,
                    crawled_at: Utc::now(),
                    outcome: PageOutcome::Error {
                        status_code: err.status_code(),
                        message: err.to_string(),
                    },
                }
            }
        };

        self.session.append_result(result);
    }
}
