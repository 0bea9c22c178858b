//! End-to-end tests for the crawl engine
//!
//! These tests run the engine against mock HTTP servers with the real
//! reqwest-backed fetcher and robots policy, exercising the full cycle:
//! config validation, frontier traversal, filtering, fetching, stats,
//! and session persistence.

use driftnet::config::CrawlConfig;
use driftnet::crawler::HttpFetcher;
use driftnet::engine::CrawlEngine;
use driftnet::robots::{AllowAll, HttpRobotsPolicy, RobotsPolicy};
use driftnet::session::{CrawlSession, SessionId, SessionStatus};
use driftnet::store::{MemoryStore, SessionStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(seed: &str) -> CrawlConfig {
    CrawlConfig {
        seed_url: seed.to_string(),
        max_depth: 2,
        max_pages: 50,
        concurrency: 2,
        delay_millis: 0,
        follow_external: false,
        respect_robots: false,
        user_agent: "driftnet-test/0.1".to_string(),
        timeout_seconds: 5,
        file_types: vec![],
        include_pattern: None,
        exclude_pattern: None,
    }
}

fn engine(robots: Arc<dyn RobotsPolicy>, store: Arc<dyn SessionStore>) -> CrawlEngine {
    CrawlEngine::new(
        Arc::new(HttpFetcher::new().expect("client")),
        robots,
        store,
    )
}

async fn wait_terminal(engine: &CrawlEngine, id: &SessionId) -> CrawlSession {
    for _ in 0..600 {
        let session = engine.get_status(id).expect("session exists");
        if session.status.is_terminal() {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached a terminal state");
}

async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_records_pages_and_stats() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        format!(
            r#"<html><head><title>Home</title>
            <meta name="description" content="front page"></head><body>
            <a href="{base}/page1">One</a>
            <a href="{base}/page2">Two</a>
            <img src="{base}/logo.png">
            </body></html>"#
        ),
    )
    .await;
    mount_html(
        &server,
        "/page1",
        "<html><head><title>Page 1</title></head><body>first</body></html>".to_string(),
    )
    .await;
    mount_html(
        &server,
        "/page2",
        "<html><head><title>Page 2</title></head><body>second</body></html>".to_string(),
    )
    .await;

    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let engine = engine(Arc::new(AllowAll), Arc::clone(&store));

    let id = engine
        .start_crawl(test_config(&format!("{base}/")))
        .unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 3);
    assert_eq!(session.stats.total_pages, 3);
    assert_eq!(session.stats.total_links, 2);
    assert_eq!(session.stats.error_count, 0);
    assert_eq!(session.stats.success_rate, 100.0);

    let seed_result = session
        .results
        .iter()
        .find(|r| r.depth == 0)
        .expect("seed result");
    assert_eq!(seed_result.title(), Some("Home"));
    assert_eq!(seed_result.links().len(), 2);
    assert!(!seed_result.is_error());

    // Terminal session reached the store
    assert!(store.get(&id).unwrap().is_some());
}

#[tokio::test]
async fn test_fetch_errors_recorded_and_crawl_continues() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/missing">gone</a>
            <a href="{base}/ok">fine</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(&server, "/ok", "<html><body>ok</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine
        .start_crawl(test_config(&format!("{base}/")))
        .unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 3);
    assert_eq!(session.stats.error_count, 1);

    let failed = session
        .results
        .iter()
        .find(|r| r.url.ends_with("/missing"))
        .expect("missing page recorded");
    assert!(failed.is_error());
    assert_eq!(failed.status_code(), Some(404));
}

#[tokio::test]
async fn test_non_html_content_yields_no_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        format!(r#"<html><body><a href="{base}/data">blob</a></body></html>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8, 1, 2, 3])
                .insert_header("content-type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine
        .start_crawl(test_config(&format!("{base}/")))
        .unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 2);

    let blob = session
        .results
        .iter()
        .find(|r| r.url.ends_with("/data"))
        .expect("blob fetched");
    assert!(!blob.is_error());
    assert!(blob.links().is_empty());
    assert_eq!(blob.title(), None);
}

#[tokio::test]
async fn test_timeout_recorded_as_error_result() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>slow</body></html>")
                .insert_header("content-type", "text/html")
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{base}/"));
    config.timeout_seconds = 1;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    // The timeout is a per-page failure, not a crawl-level fault
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 1);
    assert!(session.results[0].is_error());
    assert_eq!(session.results[0].status_code(), None);
}

#[tokio::test]
async fn test_external_links_not_followed_by_default() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    let base_a = server_a.uri();
    let base_b = server_b.uri();

    mount_html(
        &server_a,
        "/",
        format!(
            r#"<html><body>
            <a href="{base_a}/local">local</a>
            <a href="{base_b}/external">external</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(&server_a, "/local", "<html><body>here</body></html>".to_string()).await;

    // The other origin must never be contacted
    Mock::given(method("GET"))
        .and(path("/external"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server_b)
        .await;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine
        .start_crawl(test_config(&format!("{base_a}/")))
        .unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.results.len(), 2);
    // Expectations on server_b (expect(0)) are verified when it drops
}

#[tokio::test]
async fn test_follow_external_crosses_origins() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    let base_a = server_a.uri();
    let base_b = server_b.uri();

    mount_html(
        &server_a,
        "/",
        format!(r#"<html><body><a href="{base_b}/external">external</a></body></html>"#),
    )
    .await;
    mount_html(
        &server_b,
        "/external",
        "<html><body>elsewhere</body></html>".to_string(),
    )
    .await;

    let mut config = test_config(&format!("{base_a}/"));
    config.follow_external = true;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.results.len(), 2);
    assert!(session
        .results
        .iter()
        .any(|r| r.url.ends_with("/external")));
}

#[tokio::test]
async fn test_file_type_allowlist_blocks_pdf() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/doc.html">doc</a>
            <a href="{base}/report.pdf">report</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(&server, "/doc.html", "<html><body>doc</body></html>".to_string()).await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{base}/"));
    config.file_types = vec!["html".to_string()];

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.results.len(), 2);
    // Mock expectations (expect(0)) are verified when the server drops
}

#[tokio::test]
async fn test_robots_disallow_respected() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/allowed">open</a>
            <a href="{base}/admin">secret</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(&server, "/allowed", "<html><body>open</body></html>".to_string()).await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{base}/"));
    config.respect_robots = true;

    let engine = engine(
        Arc::new(HttpRobotsPolicy::new().expect("client")),
        Arc::new(MemoryStore::new()),
    );
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    // The disallowed URL is skipped without a page result
    assert_eq!(session.results.len(), 2);
    // Mock expectations (expect(0)) are verified when the server drops
}

#[tokio::test]
async fn test_robots_lookup_failure_fails_closed() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // The page itself must never be fetched
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{base}/"));
    config.respect_robots = true;

    let engine = engine(
        Arc::new(HttpRobotsPolicy::new().expect("client")),
        Arc::new(MemoryStore::new()),
    );
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.results.is_empty());
    // Mock expectations (expect(0)) are verified when the server drops
}

#[tokio::test]
async fn test_missing_robots_txt_allows_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_html(&server, "/", "<html><body>hi</body></html>".to_string()).await;

    let mut config = test_config(&format!("{base}/"));
    config.respect_robots = true;

    let engine = engine(
        Arc::new(HttpRobotsPolicy::new().expect("client")),
        Arc::new(MemoryStore::new()),
    );
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 1);
}

#[tokio::test]
async fn test_stop_request_ends_session_stopped() {
    let server = MockServer::start().await;
    let base = server.uri();

    // A page that links to many slow children keeps the crawl busy long
    // enough to observe the stop
    let links: String = (0..20)
        .map(|i| format!(r#"<a href="{base}/p{i}">l</a>"#))
        .collect();
    mount_html(&server, "/", format!("<html><body>{links}</body></html>")).await;
    for i in 0..20 {
        Mock::given(method("GET"))
            .and(path(format!("/p{i}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>x</body></html>")
                    .insert_header("content-type", "text/html")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
    }

    let mut config = test_config(&format!("{base}/"));
    config.concurrency = 1;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let id = engine.start_crawl(config).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.request_stop(&id).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.status, SessionStatus::Stopped);
    // The stop kept the crawl well under the reachable page count
    assert!(session.results.len() < 21);
    // In-flight work at stop time was still recorded
    assert!(!session.results.is_empty());
}

#[tokio::test]
async fn test_sessions_persist_through_sqlite() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<html><body>only page</body></html>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sessions.db");

    let store: Arc<dyn SessionStore> = Arc::new(SqliteStore::new(&db_path).unwrap());
    let engine = engine(Arc::new(AllowAll), Arc::clone(&store));

    let id = engine
        .start_crawl(test_config(&format!("{base}/")))
        .unwrap();
    let session = wait_terminal(&engine, &id).await;
    assert_eq!(session.status, SessionStatus::Completed);

    // Reopen the database independently and read the session back
    let reopened = SqliteStore::new(&db_path).unwrap();
    let loaded = reopened.get(&id).unwrap().expect("session persisted");
    assert_eq!(loaded.status, SessionStatus::Completed);
    assert_eq!(loaded.results.len(), 1);
    assert_eq!(loaded.stats.total_pages, 1);

    let listed = reopened.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
}

#[tokio::test]
async fn test_politeness_delay_spaces_dispatches() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/a">a</a>
            <a href="{base}/b">b</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(&server, "/a", "<html><body>a</body></html>".to_string()).await;
    mount_html(&server, "/b", "<html><body>b</body></html>".to_string()).await;

    let mut config = test_config(&format!("{base}/"));
    config.delay_millis = 100;
    config.concurrency = 1;

    let engine = engine(Arc::new(AllowAll), Arc::new(MemoryStore::new()));
    let started = std::time::Instant::now();
    let id = engine.start_crawl(config).unwrap();
    let session = wait_terminal(&engine, &id).await;

    assert_eq!(session.results.len(), 3);
    // Three dispatches with 100ms spacing need at least 200ms overall
    assert!(started.elapsed() >= Duration::from_millis(200));
}
