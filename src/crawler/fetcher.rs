//! Page fetching
//!
//! Defines the [`PageFetcher`] capability the engine depends on, and the
//! reqwest-backed [`HttpFetcher`] implementation that fetches real pages
//! and runs HTML extraction on them. The engine itself never touches the
//! network; everything goes through the trait.

use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Per-page fetch failure, recoverable: recorded on the page result
/// without stopping the crawl
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// The HTTP status associated with the failure, when there is one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Everything a successful fetch produces
///
/// Links and images are absolute URLs, already resolved against the page.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: Option<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// Capability for fetching a page and extracting its links and metadata
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<FetchOutcome, FetchError>;
}

/// HTTP implementation of [`PageFetcher`] backed by reqwest
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the fetcher with its HTTP client
    ///
    /// The per-fetch timeout comes from the caller on every request, so
    /// the client itself only carries a connect timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<FetchOutcome, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let content_length = response.content_length();

        // Redirects may have moved us; extract relative links against the
        // final URL, not the requested one
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        let is_html = content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        let mut outcome = FetchOutcome {
            status_code: status.as_u16(),
            content_type,
            content_length: content_length.or(Some(body.len() as u64)),
            last_modified,
            ..FetchOutcome::default()
        };

        if is_html {
            let extracted = parse_html(&body, &final_url);
            outcome.title = extracted.title;
            outcome.description = extracted.description;
            outcome.text = extracted.text;
            outcome.links = extracted.links;
            outcome.images = extracted.images;
        }

        Ok(outcome)
    }
}

/// Maps a reqwest error to the fetch failure class
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_fetcher() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[test]
    fn test_fetch_error_status_codes() {
        assert_eq!(FetchError::Http { status: 404 }.status_code(), Some(404));
        assert_eq!(FetchError::Timeout.status_code(), None);
        assert_eq!(
            FetchError::Connect("refused".to_string()).status_code(),
            None
        );
    }

    // HTTP behavior (status classes, content types, timeouts) is covered
    // against real mock servers in tests/engine_tests.rs
}
