//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use quaero::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use quaero::crawler::{FailReason, FetchErrorKind, SkipReason};
use quaero::extract::{Anchor, ContentExtractor, PageContent};
use quaero::state::{PageState, SiteStatus};
use quaero::storage::{GraphRepository, MemoryRepository, PageRecord, SqliteRepository};
use quaero::{Crawler, QuaeroError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to `db_path`
fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 2,
            include_external: false,
            max_workers: 4,
            request_timeout_secs: 1,
            connect_timeout_secs: 1,
            max_redirects: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn memory_crawler() -> Crawler {
    Crawler::new(
        &create_test_config(":memory:"),
        Arc::new(MemoryRepository::new()),
    )
    .expect("Failed to create crawler")
}

/// Host of a mock server as the graph stores it, e.g. `127.0.0.1:41234`
fn host_of(server: &MockServer) -> String {
    server
        .uri()
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// Mounts an HTML page at `route`
async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// Mounts a route that must never be requested
async fn mount_forbidden(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(0)
        .mount(server)
        .await;
}

fn page(repo: &dyn GraphRepository, host: &str, page_path: &str) -> PageRecord {
    let site = repo
        .find_site(host)
        .expect("Failed to query site")
        .unwrap_or_else(|| panic!("site {} missing", host));
    repo.find_page(site.id, page_path)
        .expect("Failed to query page")
        .unwrap_or_else(|| panic!("page {}{} missing", host, page_path))
}

async fn crawl(crawler: &Crawler, seed: &str, depth: u32, include_external: bool) -> quaero::CrawlReport {
    crawler
        .crawl(seed, depth, include_external, CancellationToken::new())
        .await
        .expect("Crawl failed")
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(
        &server,
        "/index",
        r##"<html><head><title>Home</title></head><body>
        <a href="/about">About</a>
        <a href="http://b.test/">B</a>
        <a href="#top">Top</a>
        </body></html>"##,
    )
    .await;
    mount_html(
        &server,
        "/about",
        r#"<html><head><title>About</title></head><body>
        <article><h1>About us</h1><p>We crawl politely.</p></article>
        </body></html>"#,
    )
    .await;

    let db_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = db_dir.path().join("graph.db");
    let repo = Arc::new(SqliteRepository::new(&db_path).expect("Failed to open database"));
    let config = create_test_config(&db_path.to_string_lossy());
    let crawler = Crawler::new(&config, repo.clone()).expect("Failed to create crawler");

    let report = crawl(&crawler, &format!("{}/index", server.uri()), 2, false).await;

    assert_eq!(report.pages_extracted, 2);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_enqueued, 2);
    assert!(!report.cancelled);

    let index = page(repo.as_ref(), &host, "/index");
    assert_eq!(index.state, PageState::Extracted);
    assert_eq!(index.status_code, Some(200));
    assert_eq!(index.title.as_deref(), Some("Home"));

    let about = page(repo.as_ref(), &host, "/about");
    assert_eq!(about.state, PageState::Extracted);
    assert_eq!(about.article_title.as_deref(), Some("About us"));
    assert_eq!(about.backlink_count, 1);

    let external = page(repo.as_ref(), "b.test", "/");
    assert_eq!(external.state, PageState::Discovered);
    assert!(external.last_crawled_at.is_none());

    // The fragment-only anchor adds no edge
    let links = repo.outgoing_links(index.id).expect("Failed to load links");
    assert_eq!(links.len(), 2);
    assert_eq!(repo.count_sites().unwrap(), 2);
    assert_eq!(repo.count_pages().unwrap(), 3);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
    )
    .await;
    mount_html(&server, "/a", r#"<html><body><a href="/">Home</a></body></html>"#).await;
    mount_html(&server, "/b", "<html><body>B</body></html>").await;

    let repo = Arc::new(MemoryRepository::new());
    let crawler = Crawler::new(&create_test_config(":memory:"), repo.clone())
        .expect("Failed to create crawler");

    crawl(&crawler, &server.uri(), 3, false).await;
    let pages = repo.count_pages().unwrap();
    let links = repo.count_links().unwrap();
    let home_backlinks = page(repo.as_ref(), &host, "/").backlink_count;

    crawl(&crawler, &server.uri(), 3, false).await;
    assert_eq!(repo.count_pages().unwrap(), pages);
    assert_eq!(repo.count_links().unwrap(), links);
    assert_eq!(page(repo.as_ref(), &host, "/").backlink_count, home_backlinks);
    assert_eq!(pages, 3);
    assert_eq!(links, 3);
    assert_eq!(home_backlinks, 1);
}

#[tokio::test]
async fn test_stale_links_pruned_on_recrawl() {
    let server = MockServer::start().await;
    let host = host_of(&server);
    let repo = Arc::new(MemoryRepository::new());
    let crawler = Crawler::new(&create_test_config(":memory:"), repo.clone())
        .expect("Failed to create crawler");

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
    )
    .await;
    crawl(&crawler, &server.uri(), 1, false).await;

    server.reset().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/c">C</a></body></html>"#,
    )
    .await;
    crawl(&crawler, &server.uri(), 1, false).await;

    let home = page(repo.as_ref(), &host, "/");
    let mut targets: Vec<i64> = repo
        .outgoing_links(home.id)
        .unwrap()
        .iter()
        .map(|link| link.to_page_id)
        .collect();
    targets.sort();

    let a = page(repo.as_ref(), &host, "/a");
    let b = page(repo.as_ref(), &host, "/b");
    let c = page(repo.as_ref(), &host, "/c");
    assert_eq!(targets, vec![a.id, c.id]);
    assert_eq!(b.backlink_count, 0);
    assert_eq!(a.backlink_count, 1);
    // Pruning removes the edge, never the page
    assert_eq!(b.state, PageState::Discovered);
}

#[tokio::test]
async fn test_depth_one_fetches_only_seed() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(&server, "/", r#"<html><body><a href="/next">Next</a></body></html>"#).await;
    mount_forbidden(&server, "/next").await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &server.uri(), 1, false).await;

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.links_recorded, 1);
    let next = page(crawler.repository().as_ref(), &host, "/next");
    assert_eq!(next.state, PageState::Discovered);
}

#[tokio::test]
async fn test_robots_disallowed_page_not_fetched() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/private">Secret</a><a href="/public">Open</a></body></html>"#,
    )
    .await;
    mount_html(&server, "/public", "<html><body>Public</body></html>").await;
    mount_forbidden(&server, "/private").await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(report.skipped.get(&SkipReason::RobotsDisallowed), Some(&1));
    assert_eq!(report.pages_extracted, 2);

    let repo = crawler.repository();
    let private = page(repo.as_ref(), &host, "/private");
    assert_eq!(private.state, PageState::RobotsDisallowed);
    assert_eq!(private.status_code, None);

    let site = repo.find_site(&host).unwrap().unwrap();
    assert_eq!(site.robots_status, Some(200));
    assert!(site.robots_txt.unwrap().contains("Disallow: /private"));
}

#[tokio::test]
async fn test_nofollow_recorded_but_not_followed() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(
        &server,
        "/",
        r#"<html><body><a rel="NoFollow external" href="/hidden" title="Hidden">Hidden</a></body></html>"#,
    )
    .await;
    mount_forbidden(&server, "/hidden").await;

    let crawler = memory_crawler();
    crawl(&crawler, &server.uri(), 3, false).await;

    let repo = crawler.repository();
    let home = page(repo.as_ref(), &host, "/");
    let links = repo.outgoing_links(home.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].rel.as_deref(), Some("NoFollow external"));
    assert_eq!(links[0].title.as_deref(), Some("Hidden"));
    assert_eq!(links[0].text, "Hidden");
    assert_eq!(page(repo.as_ref(), &host, "/hidden").state, PageState::Discovered);
}

#[tokio::test]
async fn test_external_links_recorded_not_followed() {
    let home = MockServer::start().await;
    let other = MockServer::start().await;

    mount_html(
        &home,
        "/",
        &format!(r#"<html><body><a href="{}/landing">Elsewhere</a></body></html>"#, other.uri()),
    )
    .await;
    mount_forbidden(&other, "/landing").await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &home.uri(), 3, false).await;

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.links_recorded, 1);
    let landing = page(crawler.repository().as_ref(), &host_of(&other), "/landing");
    assert_eq!(landing.state, PageState::Discovered);
    assert_eq!(landing.backlink_count, 1);
}

#[tokio::test]
async fn test_external_links_followed_when_included() {
    let home = MockServer::start().await;
    let other = MockServer::start().await;

    mount_html(
        &home,
        "/",
        &format!(r#"<html><body><a href="{}/landing">Elsewhere</a></body></html>"#, other.uri()),
    )
    .await;
    mount_html(&other, "/landing", "<html><head><title>Landing</title></head></html>").await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &home.uri(), 2, true).await;

    assert_eq!(report.pages_extracted, 2);
    let landing = page(crawler.repository().as_ref(), &host_of(&other), "/landing");
    assert_eq!(landing.state, PageState::Extracted);
    assert_eq!(landing.title.as_deref(), Some("Landing"));
}

#[tokio::test]
async fn test_non_html_response_is_fetched_not_extracted() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(&server, "/", r#"<html><body><a href="/data.json">Data</a></body></html>"#).await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a": 1}"#, "application/json"))
        .mount(&server)
        .await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_extracted, 1);

    let data = page(crawler.repository().as_ref(), &host, "/data.json");
    assert_eq!(data.state, PageState::Fetched);
    assert_eq!(data.status_code, Some(200));
    assert_eq!(data.content_type.as_deref(), Some("application/json"));
    assert!(data.raw_body.is_none());
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_siblings() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/slow">Slow</a><a href="/fast">Fast</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/fast", "<html><body>Fast</body></html>").await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(
        report.failed.get(&FailReason::Fetch(FetchErrorKind::Timeout)),
        Some(&1)
    );
    assert_eq!(report.pages_extracted, 2);

    let repo = crawler.repository();
    let slow = page(repo.as_ref(), &host, "/slow");
    assert_eq!(slow.state, PageState::Failed);
    assert!(slow.error_message.is_some());
    assert_eq!(page(repo.as_ref(), &host, "/fast").state, PageState::Extracted);
}

#[tokio::test]
async fn test_blocked_site_is_not_contacted() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let repo = Arc::new(MemoryRepository::new());
    let site = repo.get_or_create_site(&host).unwrap();
    repo.set_site_status(site.id, SiteStatus::Spam).unwrap();

    let crawler = Crawler::new(&create_test_config(":memory:"), repo.clone())
        .expect("Failed to create crawler");
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(report.skipped.get(&SkipReason::SiteBlocked), Some(&1));
    assert_eq!(report.pages_fetched, 0);
    assert_eq!(page(repo.as_ref(), &host, "/").state, PageState::SiteBlocked);
}

#[tokio::test]
async fn test_cancellation_stops_new_visits() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><body><a href="/one">1</a><a href="/two">2</a></body></html>"#,
                    "text/html",
                )
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    mount_forbidden(&server, "/one").await;
    mount_forbidden(&server, "/two").await;

    let crawler = memory_crawler();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = crawler
        .crawl(&server.uri(), 3, false, cancel)
        .await
        .expect("Crawl failed");

    // The in-flight seed visit finishes; its children never start
    assert!(report.cancelled);
    assert_eq!(report.pages_extracted, 1);
    assert_eq!(report.pages_enqueued, 3);
    let repo = crawler.repository();
    assert_eq!(page(repo.as_ref(), &host, "/one").state, PageState::Discovered);
}

#[tokio::test]
async fn test_self_link_fetched_once() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<html><body><a href="/index">Again</a><a href="{}/index">Absolute</a></body></html>"#,
                server.uri()
            ),
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &format!("{}/index", server.uri()), 3, false).await;

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.pages_enqueued, 1);

    let repo = crawler.repository();
    let index = page(repo.as_ref(), &host, "/index");
    let links = repo.outgoing_links(index.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].to_page_id, index.id);
    assert_eq!(index.backlink_count, 1);
}

#[tokio::test]
async fn test_redirect_resolves_links_against_final_url() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs/new"))
        .mount(&server)
        .await;
    mount_html(&server, "/docs/new", r#"<html><body><a href="child">Child</a></body></html>"#)
        .await;

    let crawler = memory_crawler();
    crawl(&crawler, &format!("{}/old", server.uri()), 1, false).await;

    let repo = crawler.repository();
    let old = page(repo.as_ref(), &host, "/old");
    assert_eq!(old.state, PageState::Extracted);
    assert_eq!(old.status_code, Some(200));

    let child = page(repo.as_ref(), &host, "/docs/child");
    let links = repo.outgoing_links(old.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].to_page_id, child.id);
    let site = repo.find_site(&host).unwrap().unwrap();
    assert!(repo.find_page(site.id, "/child").unwrap().is_none());
}

#[tokio::test]
async fn test_redirect_off_host_is_not_extracted() {
    let home = MockServer::start().await;
    let other = MockServer::start().await;
    let host = host_of(&home);

    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/landing", other.uri())),
        )
        .mount(&home)
        .await;
    mount_html(&other, "/landing", r#"<html><body><a href="/deeper">Deeper</a></body></html>"#)
        .await;

    let crawler = memory_crawler();
    let report = crawl(&crawler, &format!("{}/away", home.uri()), 2, false).await;

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.pages_extracted, 0);

    let repo = crawler.repository();
    let away = page(repo.as_ref(), &host, "/away");
    assert_eq!(away.state, PageState::Fetched);
    assert!(away.raw_body.is_none());
    assert!(repo.outgoing_links(away.id).unwrap().is_empty());
    assert!(repo.find_site(&host_of(&other)).unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_runs_share_one_graph() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    // Each run keeps its own robots cache
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .expect(2)
        .mount(&server)
        .await;
    mount_html(&server, "/one", r#"<html><body><a href="/shared">Shared</a></body></html>"#)
        .await;
    mount_html(&server, "/two", r#"<html><body><a href="/shared">Shared</a></body></html>"#)
        .await;
    mount_html(&server, "/shared", "<html><body>Shared</body></html>").await;

    let db_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = db_dir.path().join("graph.db");
    let repo = Arc::new(SqliteRepository::new(&db_path).expect("Failed to open database"));
    let config = create_test_config(&db_path.to_string_lossy());
    let first = Crawler::new(&config, repo.clone()).expect("Failed to create crawler");
    let second = Crawler::new(&config, repo.clone()).expect("Failed to create crawler");

    let seed_one = format!("{}/one", server.uri());
    let seed_two = format!("{}/two", server.uri());
    let (a, b) = tokio::join!(
        crawl(&first, &seed_one, 2, false),
        crawl(&second, &seed_two, 2, false)
    );

    assert_eq!(a.pages_extracted, 2);
    assert_eq!(b.pages_extracted, 2);
    assert_eq!(repo.count_sites().unwrap(), 1);
    assert_eq!(repo.count_pages().unwrap(), 3);
    assert_eq!(repo.count_links().unwrap(), 2);

    let shared = page(repo.as_ref(), &host, "/shared");
    assert_eq!(shared.state, PageState::Extracted);
    assert_eq!(shared.backlink_count, 2);
}

/// Ignores the document and reports one fixed link
struct FixedLinkExtractor;

impl ContentExtractor for FixedLinkExtractor {
    fn extract(&self, _body: &[u8], _page_url: &Url) -> PageContent {
        PageContent {
            title: Some("Fixed".to_string()),
            anchors: vec![Anchor {
                href: "/listed".to_string(),
                title: None,
                rel_tokens: Vec::new(),
                text: "Listed".to_string(),
            }],
            ..Default::default()
        }
    }
}

struct PanickingExtractor;

impl ContentExtractor for PanickingExtractor {
    fn extract(&self, _body: &[u8], _page_url: &Url) -> PageContent {
        panic!("extractor exploded");
    }
}

#[tokio::test]
async fn test_custom_extractor_drives_links() {
    let server = MockServer::start().await;
    let host = host_of(&server);

    mount_html(&server, "/", "<html><body>No anchors here</body></html>").await;
    Mock::given(method("GET"))
        .and(path("/listed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = memory_crawler().with_extractor(Arc::new(FixedLinkExtractor));
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(report.pages_extracted, 2);
    let repo = crawler.repository();
    let home = page(repo.as_ref(), &host, "/");
    assert_eq!(home.title.as_deref(), Some("Fixed"));
    let links = repo.outgoing_links(home.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].text, "Listed");
}

#[tokio::test]
async fn test_panicking_visit_is_counted() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "<html><body>Boom</body></html>").await;

    let crawler = memory_crawler().with_extractor(Arc::new(PanickingExtractor));
    let report = crawl(&crawler, &server.uri(), 2, false).await;

    assert_eq!(report.failed.get(&FailReason::Panic), Some(&1));
    assert_eq!(report.pages_visited(), 1);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_invalid_seed_and_depth() {
    let crawler = memory_crawler();

    let result = crawler
        .crawl("ftp://a.test/file", 2, false, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(QuaeroError::Url(_))));

    let result = crawler
        .crawl("http://a.test/", 0, false, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(QuaeroError::InvalidDepth(0))));

    assert_eq!(crawler.repository().count_sites().unwrap(), 0);
}
