//! Driftnet main entry point
//!
//! Command-line interface for running crawls from a TOML configuration
//! file, validating configurations, and listing stored sessions.

use anyhow::Context;
use clap::Parser;
use driftnet::config::{load_config_with_hash, FileConfig};
use driftnet::crawler::HttpFetcher;
use driftnet::engine::CrawlEngine;
use driftnet::robots::{AllowAll, HttpRobotsPolicy, RobotsPolicy};
use driftnet::session::{CrawlSession, SessionStatus};
use driftnet::store::{MemoryStore, SessionStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Driftnet: a breadth-first site crawler
///
/// Crawls a site from a seed URL under a configurable policy and records
/// per-page results and aggregate statistics for each session.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A breadth-first site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration and exit without crawling
    #[arg(long, conflicts_with = "sessions")]
    validate: bool,

    /// List stored sessions and exit
    #[arg(long, conflicts_with = "validate")]
    sessions: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) =
        load_config_with_hash(&cli.config).context("failed to load configuration")?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.validate {
        handle_validate(&config);
        return Ok(());
    }

    if cli.sessions {
        return handle_sessions(&config);
    }

    handle_crawl(config).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --validate: the configuration already passed validation at load
fn handle_validate(config: &FileConfig) {
    let crawl = &config.crawl;

    println!("=== Driftnet Configuration ===\n");
    println!("Seed URL: {}", crawl.seed_url);
    println!("  Max depth: {}", crawl.max_depth);
    println!("  Max pages: {}", crawl.max_pages);
    println!("  Concurrency: {}", crawl.concurrency);
    println!("  Politeness delay: {}ms", crawl.delay_millis);
    println!("  Follow external links: {}", crawl.follow_external);
    println!("  Respect robots.txt: {}", crawl.respect_robots);
    println!("  User agent: {}", crawl.user_agent);
    println!("  Fetch timeout: {}s", crawl.timeout_seconds);

    if crawl.file_types.is_empty() {
        println!("  File types: all");
    } else {
        println!("  File types: {}", crawl.file_types.join(", "));
    }
    if let Some(pattern) = &crawl.include_pattern {
        println!("  Include pattern: {}", pattern);
    }
    if let Some(pattern) = &crawl.exclude_pattern {
        println!("  Exclude pattern: {}", pattern);
    }

    match &config.output.database_path {
        Some(path) => println!("\nSession database: {}", path),
        None => println!("\nSession database: none (in-memory only)"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles --sessions: lists sessions from the configured database
fn handle_sessions(config: &FileConfig) -> anyhow::Result<()> {
    let Some(path) = &config.output.database_path else {
        anyhow::bail!("no database-path configured; nothing to list");
    };

    let store = SqliteStore::new(Path::new(path))?;
    let sessions = store.list()?;

    if sessions.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }

    println!("=== Stored Sessions ({}) ===\n", sessions.len());
    for summary in sessions {
        println!(
            "{}  {}  [{}]  pages: {}, errors: {}, {:.1}% ok",
            summary.id,
            summary.seed_url,
            summary.status,
            summary.stats.total_pages,
            summary.stats.error_count,
            summary.stats.success_rate,
        );
    }

    Ok(())
}

/// Runs a crawl to completion, stopping gracefully on Ctrl-C
async fn handle_crawl(config: FileConfig) -> anyhow::Result<()> {
    let store: Arc<dyn SessionStore> = match &config.output.database_path {
        Some(path) => Arc::new(SqliteStore::new(Path::new(path))?),
        None => Arc::new(MemoryStore::new()),
    };

    let robots: Arc<dyn RobotsPolicy> = if config.crawl.respect_robots {
        Arc::new(HttpRobotsPolicy::new()?)
    } else {
        Arc::new(AllowAll)
    };

    let engine = CrawlEngine::new(Arc::new(HttpFetcher::new()?), robots, store);

    let session_id = engine.start_crawl(config.crawl)?;
    tracing::info!("session {} started", session_id);

    let mut stop_requested = false;
    let session = loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                tracing::info!("interrupt received, stopping session {}", session_id);
                engine.request_stop(&session_id)?;
                stop_requested = true;
            }
        }

        let session = engine.get_status(&session_id)?;
        if session.status.is_terminal() {
            break session;
        }
    };

    print_summary(&session);

    if session.status == SessionStatus::Error {
        anyhow::bail!(
            "session ended with an engine fault: {}",
            session.fault.as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}

/// Prints the final session summary
fn print_summary(session: &CrawlSession) {
    let stats = &session.stats;

    println!("\n=== Crawl Summary ===\n");
    println!("Session: {}", session.id);
    println!("Seed URL: {}", session.config.seed_url);
    println!("Status: {}", session.status);
    println!();
    println!("  Pages crawled: {}", stats.total_pages);
    println!("  Links found: {}", stats.total_links);
    println!("  Errors: {}", stats.error_count);
    println!("  Success rate: {:.1}%", stats.success_rate);
    println!("  Avg response time: {:.0}ms", stats.avg_response_time_ms);
    println!("  Total time: {:.1}s", stats.total_time_ms as f64 / 1000.0);

    let errors: Vec<_> = session.results.iter().filter(|r| r.is_error()).collect();
    if !errors.is_empty() {
        println!("\nFailed pages:");
        for result in errors {
            if let driftnet::session::PageOutcome::Error { message, .. } = &result.outcome {
                println!("  - {} ({})", result.url, message);
            }
        }
    }
}
