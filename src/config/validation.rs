use crate::config::types::CrawlConfig;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates a crawl configuration
///
/// Runs once before a session is created; a configuration that fails any
/// check never produces a session. Malformed include/exclude patterns are
/// rejected here so that filter evaluation during the crawl is infallible.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_seed_url(&config.seed_url)?;
    validate_bounds(config)?;
    validate_user_agent(&config.user_agent)?;
    validate_file_types(&config.file_types)?;
    validate_pattern("include-pattern", config.include_pattern.as_deref())?;
    validate_pattern("exclude-pattern", config.exclude_pattern.as_deref())?;
    Ok(())
}

/// Validates the seed URL: parseable, http(s), and with a host
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed).map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}': only http and https schemes are supported",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("'{}': missing host", seed)));
    }

    Ok(())
}

/// Validates numeric policy bounds
fn validate_bounds(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_depth < 1 || config.max_depth > 10 {
        return Err(ConfigError::Validation(format!(
            "max-depth must be between 1 and 10, got {}",
            config.max_depth
        )));
    }

    if config.max_pages < 1 || config.max_pages > 100_000 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be between 1 and 100000, got {}",
            config.max_pages
        )));
    }

    if config.concurrency < 1 || config.concurrency > 50 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 50, got {}",
            config.concurrency
        )));
    }

    if config.delay_millis > 10_000 {
        return Err(ConfigError::Validation(format!(
            "delay-millis must be <= 10000, got {}",
            config.delay_millis
        )));
    }

    if config.timeout_seconds < 1 || config.timeout_seconds > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout-seconds must be between 1 and 300, got {}",
            config.timeout_seconds
        )));
    }

    Ok(())
}

/// Validates the user agent string
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates file-type allowlist entries
///
/// Entries are extensions without the leading dot, e.g. "html" or "pdf".
fn validate_file_types(file_types: &[String]) -> Result<(), ConfigError> {
    for entry in file_types {
        if entry.is_empty() {
            return Err(ConfigError::Validation(
                "file-types entries cannot be empty".to_string(),
            ));
        }

        if entry.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "file-types entry '{}' must not include the leading dot",
                entry
            )));
        }

        if !entry.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "file-types entry '{}' contains invalid characters",
                entry
            )));
        }
    }

    Ok(())
}

/// Compiles a URL pattern to verify it is well-formed
fn validate_pattern(name: &str, pattern: Option<&str>) -> Result<(), ConfigError> {
    if let Some(p) = pattern {
        Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", name, e)))?;
    }
    Ok(())
}
