//! Admission filter for discovered links
//!
//! Decides whether a discovered URL is eligible for the frontier, given
//! the crawl configuration and the origin of the page that discovered it.
//! Patterns are compiled once at configuration validation time, so
//! evaluation during the crawl is a pure, infallible predicate.

use crate::config::CrawlConfig;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::{Origin, Url};

/// Compiled URL admission filter
#[derive(Debug)]
pub struct UrlFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
    file_types: HashSet<String>,
    follow_external: bool,
}

impl UrlFilter {
    /// Compiles the filter from a validated configuration
    ///
    /// File-type entries are lowercased so matching is case-insensitive.
    pub fn compile(config: &CrawlConfig) -> Result<Self, ConfigError> {
        let include = config
            .include_pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| ConfigError::InvalidPattern(e.to_string())))
            .transpose()?;

        let exclude = config
            .exclude_pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| ConfigError::InvalidPattern(e.to_string())))
            .transpose()?;

        let file_types = config
            .file_types
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        Ok(Self {
            include,
            exclude,
            file_types,
            follow_external: config.follow_external,
        })
    }

    /// Decides whether a candidate URL may be enqueued
    ///
    /// Rules are applied in order; the first failing rule rejects:
    ///
    /// 1. `include` pattern set and the URL does not match it
    /// 2. `exclude` pattern set and the URL matches it
    /// 3. File-type allowlist non-empty and the URL path carries an
    ///    extension outside it. URLs without a discernible extension
    ///    (directory-style paths like `/about`) are always admitted:
    ///    the allowlist exists to exclude binary assets, not clean paths.
    /// 4. `follow-external` disabled and the candidate's origin differs
    ///    from `source_origin` (origin = scheme + host + port)
    ///
    /// The seed URL is never passed through this filter; only discovered
    /// links are.
    pub fn admit(&self, candidate: &Url, source_origin: &Origin) -> bool {
        let candidate_str = candidate.as_str();

        if let Some(include) = &self.include {
            if !include.is_match(candidate_str) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(candidate_str) {
                return false;
            }
        }

        if !self.file_types.is_empty() {
            if let Some(ext) = path_extension(candidate) {
                if !self.file_types.contains(&ext) {
                    return false;
                }
            }
        }

        if !self.follow_external && candidate.origin() != *source_origin {
            return false;
        }

        true
    }
}

/// Extracts the lowercase file extension from a URL path
///
/// The extension is the part of the final path segment following the final
/// dot; a segment without a dot (or with only a leading dot) has none.
fn path_extension(url: &Url) -> Option<String> {
    let last_segment = url.path().rsplit('/').next()?;

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_lowercase()),
        _ => None,
    }
}
