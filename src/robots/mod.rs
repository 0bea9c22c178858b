//! Robots.txt policy
//!
//! The engine consults a [`RobotsPolicy`] capability before dispatching a
//! fetch; it never parses robots.txt itself. The HTTP implementation
//! fetches `/robots.txt` once per origin, caches the body, and matches
//! rules with the `robotstxt` crate. A lookup failure is surfaced as an
//! error so the governor can fail closed.

use async_trait::async_trait;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

/// Errors from robots.txt lookups
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("Failed to fetch robots.txt for {origin}: {message}")]
    Fetch { origin: String, message: String },

    #[error("Cannot derive robots.txt location for {0}")]
    BadUrl(String),
}

/// Capability deciding whether a URL may be fetched
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn is_allowed(&self, url: &Url, user_agent: &str) -> Result<bool, RobotsError>;
}

/// Policy that allows every URL
///
/// Used when `respect-robots` is disabled and as a test stand-in.
pub struct AllowAll;

#[async_trait]
impl RobotsPolicy for AllowAll {
    async fn is_allowed(&self, _url: &Url, _user_agent: &str) -> Result<bool, RobotsError> {
        Ok(true)
    }
}

/// Policy over a fixed robots.txt body, independent of any network
pub struct StaticRobots {
    content: String,
}

impl StaticRobots {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
impl RobotsPolicy for StaticRobots {
    async fn is_allowed(&self, url: &Url, user_agent: &str) -> Result<bool, RobotsError> {
        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&self.content, user_agent, url.as_str()))
    }
}

/// HTTP-backed robots policy with a per-origin cache
///
/// The robots.txt body is fetched once per origin and reused for every
/// URL on it. A missing robots.txt (404 or any other 4xx) means the site
/// poses no restrictions and is cached as an empty body; transport
/// failures and 5xx responses are returned as errors and not cached, so
/// a transient failure can recover on a later URL.
pub struct HttpRobotsPolicy {
    client: Client,
    cache: Mutex<HashMap<String, Arc<String>>>,
}

impl HttpRobotsPolicy {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the robots.txt body for the URL's origin, fetching on miss
    async fn robots_body(&self, url: &Url, user_agent: &str) -> Result<Arc<String>, RobotsError> {
        let origin = url.origin().ascii_serialization();

        {
            let cache = self.cache.lock().await;
            if let Some(body) = cache.get(&origin) {
                return Ok(Arc::clone(body));
            }
        }

        let robots_url = url
            .join("/robots.txt")
            .map_err(|_| RobotsError::BadUrl(url.to_string()))?;

        tracing::debug!("fetching robots.txt from {}", robots_url);

        let response = self
            .client
            .get(robots_url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| RobotsError::Fetch {
                origin: origin.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = if status.is_success() {
            response.text().await.map_err(|e| RobotsError::Fetch {
                origin: origin.clone(),
                message: e.to_string(),
            })?
        } else if status.is_client_error() {
            // No robots.txt: the site poses no restrictions
            String::new()
        } else {
            return Err(RobotsError::Fetch {
                origin,
                message: format!("HTTP {}", status.as_u16()),
            });
        };

        let body = Arc::new(body);
        let mut cache = self.cache.lock().await;
        cache.insert(origin, Arc::clone(&body));
        Ok(body)
    }
}

#[async_trait]
impl RobotsPolicy for HttpRobotsPolicy {
    async fn is_allowed(&self, url: &Url, user_agent: &str) -> Result<bool, RobotsError> {
        let body = self.robots_body(url, user_agent).await?;

        if body.is_empty() {
            return Ok(true);
        }

        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&body, user_agent, url.as_str()))
    }
}
