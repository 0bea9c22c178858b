//! Politeness governor
//!
//! Enforces the minimum spacing between consecutive fetch dispatches and
//! gates every dispatch on the robots policy. The spacing timeline is
//! global, not per-host: with a delay of `d`, at most one dispatch is
//! permitted per `d` regardless of how many hosts are in the frontier.

use crate::config::CrawlConfig;
use crate::robots::RobotsPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

pub struct Governor {
    delay: Duration,
    last_dispatch: Option<Instant>,
    robots: Arc<dyn RobotsPolicy>,
    respect_robots: bool,
    user_agent: String,
}

impl Governor {
    pub fn new(config: &CrawlConfig, robots: Arc<dyn RobotsPolicy>) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_millis),
            last_dispatch: None,
            robots,
            respect_robots: config.respect_robots,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Suspends the caller until the politeness delay since the previous
    /// permitted dispatch has elapsed, then claims the slot
    pub async fn await_slot(&mut self) {
        if let Some(last) = self.last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                sleep(self.delay - elapsed).await;
            }
        }

        self.last_dispatch = Some(Instant::now());
    }

    /// Whether the robots policy permits fetching this URL
    ///
    /// Constant `true` when `respect-robots` is disabled. A lookup failure
    /// is treated as a disallow (fail closed); the URL is skipped, not
    /// retried.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        if !self.respect_robots {
            return true;
        }

        match self.robots.is_allowed(url, &self.user_agent).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!("robots lookup failed for {}: {}; treating as disallowed", url, e);
                false
            }
        }
    }
}
