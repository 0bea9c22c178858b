use serde::Deserialize;

/// Top-level configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl policy configuration
///
/// Immutable once a session starts: the engine takes an owned copy at
/// session creation and never reads the original again.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Seed URL the crawl starts from (depth 0)
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Maximum link depth from the seed
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of fetch attempts per session
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum number of simultaneously in-flight fetches
    pub concurrency: u32,

    /// Minimum spacing between consecutive fetch dispatches (milliseconds)
    #[serde(rename = "delay-millis", default)]
    pub delay_millis: u64,

    /// Whether links to a different origin than their source page are followed
    #[serde(rename = "follow-external", default)]
    pub follow_external: bool,

    /// Whether robots.txt is consulted before each fetch
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// User agent string sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-fetch timeout (seconds)
    #[serde(rename = "timeout-seconds")]
    pub timeout_seconds: u64,

    /// Allowed file extensions for discovered links; empty allows all
    #[serde(rename = "file-types", default)]
    pub file_types: Vec<String>,

    /// Regular expression a discovered link must match to be admitted
    #[serde(rename = "include-pattern", default)]
    pub include_pattern: Option<String>,

    /// Regular expression that rejects a discovered link when it matches
    #[serde(rename = "exclude-pattern", default)]
    pub exclude_pattern: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite session database; in-memory sessions only when unset
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

fn default_true() -> bool {
    true
}
