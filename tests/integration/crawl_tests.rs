//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! admit, fetch, store and discover cycle over real HTTP, SQLite storage and
//! the durable SQLite frontier.

use ripple_crawl::config::{Config, CrawlerConfig, OutputConfig, QueueConfig, TimeoutConfig};
use ripple_crawl::crawler::{Coordinator, Fetcher, HttpFetcher};
use ripple_crawl::output::CrawlStatistics;
use ripple_crawl::queue::SqliteFrontier;
use ripple_crawl::storage::{SqliteStorage, Storage};
use ripple_crawl::FetchError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that only admits the mock server's host
fn create_test_config(seeds: Vec<String>, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 1,
            max_concurrent_requests: 4,
            batch_worker_divisor: 2,
            crawl_delay_ms: 0,
            user_agent: "RippleTest/1.0".to_string(),
            seed_urls: seeds,
            allowed_domains: vec![r"127\.0\.0\.1".to_string()],
            ..CrawlerConfig::default()
        },
        timeouts: TimeoutConfig {
            poll_timeout_ms: 50,
            fetch_timeout_ms: 2000,
            robots_timeout_ms: 1000,
            error_backoff_ms: 50,
        },
        queue: QueueConfig { batch_size: 10 },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
        },
    }
}

struct TestCrawl {
    coordinator: Coordinator,
    storage: Arc<SqliteStorage>,
    frontier: SqliteFrontier,
    _dir: TempDir,
}

fn build_crawl(seeds: Vec<String>) -> TestCrawl {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(seeds, &db_path);

    let fetcher = HttpFetcher::new(&config.crawler.user_agent).expect("Failed to build fetcher");
    let storage = Arc::new(SqliteStorage::new(&db_path).expect("Failed to open storage"));
    let frontier = SqliteFrontier::open(&db_path, config.queue.batch_size)
        .expect("Failed to open frontier");

    let coordinator = Coordinator::new(
        config,
        Arc::new(fetcher),
        storage.clone(),
        Arc::new(frontier.clone()),
        Box::new(frontier.clone()),
    )
    .expect("Failed to create coordinator");

    TestCrawl {
        coordinator,
        storage,
        frontier,
        _dir: dir,
    }
}

/// Waits until the statistics satisfy `done`, or five seconds pass
async fn wait_for(coordinator: &Coordinator, done: impl Fn(&CrawlStatistics) -> bool) -> bool {
    for _ in 0..250 {
        if done(&coordinator.statistics()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_follows_only_allowed_domains() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        html(&format!(
            r#"<a href="{}/x">X</a><a href="https://b.test/y">Y</a>"#,
            base_url
        )),
    )
    .await;
    mount_page(&mock_server, "/x", html(r#"<a href="/too-deep">deeper</a>"#)).await;

    Mock::given(method("GET"))
        .and(path("/too-deep"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut crawl = build_crawl(vec![format!("{}/", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored == 2 && s.rejected == 1).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished, "crawl did not finish: {:?}", crawl.coordinator.statistics());

    let root = crawl
        .storage
        .retrieve(&format!("{}/", base_url))
        .await
        .unwrap()
        .expect("root page should be stored");
    assert_eq!(root.depth(), Some(0));
    assert!(root.links.contains("https://b.test/y"));

    let child = crawl
        .storage
        .retrieve(&format!("{}/x", base_url))
        .await
        .unwrap()
        .expect("child page should be stored");
    assert_eq!(child.depth(), Some(1));

    // b.test was filtered at discovery time, so only the depth-2 link was rejected
    let stats = crawl.coordinator.statistics();
    assert_eq!(stats.links_enqueued, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_robots_txt_disallow_respected() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_page(
        &mock_server,
        "/",
        html(r#"<a href="/private/page">private</a><a href="/public/page">public</a>"#),
    )
    .await;
    mount_page(&mock_server, "/public/page", html("public")).await;

    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut crawl = build_crawl(vec![format!("{}/", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored == 2 && s.rejected == 1).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished, "crawl did not finish: {:?}", crawl.coordinator.statistics());

    assert!(crawl
        .storage
        .retrieve(&format!("{}/private/page", base_url))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_missing_robots_txt_allows_everything() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // No robots.txt mock: wiremock answers 404
    mount_page(&mock_server, "/", html(r#"<a href="/admin">admin</a>"#)).await;
    mount_page(&mock_server, "/admin", html("admin")).await;

    let mut crawl = build_crawl(vec![format!("{}/", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored == 2).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished, "crawl did not finish: {:?}", crawl.coordinator.statistics());
}

#[tokio::test]
async fn test_duplicate_content_stored_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Both pages serve the same bytes; /b is only reachable through /a
    let same = r#"<html><body><a href="/b">b</a></body></html>"#;
    for page in ["/a", "/b"] {
        mount_page(
            &mock_server,
            page,
            ResponseTemplate::new(200)
                .set_body_string(same)
                .insert_header("content-type", "text/html"),
        )
        .await;
    }

    let mut crawl = build_crawl(vec![format!("{}/a", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored + s.duplicates == 2).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished, "crawl did not finish: {:?}", crawl.coordinator.statistics());

    let stats = crawl.coordinator.statistics();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(crawl.storage.page_count().await.unwrap(), 1);
    assert!(crawl
        .storage
        .retrieve(&format!("{}/b", base_url))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_http_errors_are_not_stored() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/broken", ResponseTemplate::new(500)).await;
    mount_page(&mock_server, "/ok", html("fine")).await;

    let mut crawl = build_crawl(vec![format!("{}/broken", base_url), format!("{}/ok", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored == 1 && s.failed == 1).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished, "crawl did not finish: {:?}", crawl.coordinator.statistics());

    assert_eq!(crawl.storage.page_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_stop_commits_frontier() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", html("home")).await;

    let mut crawl = build_crawl(vec![format!("{}/", base_url)]);
    crawl.coordinator.start().await.expect("Failed to start");

    let finished = wait_for(&crawl.coordinator, |s| s.stored == 1).await;
    crawl.coordinator.stop().await.expect("Failed to stop");
    assert!(finished);

    let stats = crawl.coordinator.statistics();
    assert_eq!(stats.batches_committed, stats.batches_polled);
    assert_eq!(crawl.frontier.leased_count().await.unwrap(), 0);
    assert_eq!(crawl.frontier.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_http_fetcher_returns_body_and_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8, 159, 146, 150])
                .insert_header("content-type", "application/octet-stream")
                .insert_header("x-custom", "yes"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new("RippleTest/1.0").unwrap();
    let page = fetcher
        .fetch(&format!("{}/page", mock_server.uri()), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, vec![0u8, 159, 146, 150]);
    assert_eq!(page.headers.get("x-custom").map(String::as_str), Some("yes"));
    assert!(!page.is_html());
}

#[tokio::test]
async fn test_http_fetcher_maps_status_and_timeout() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/gone", ResponseTemplate::new(404)).await;
    mount_page(
        &mock_server,
        "/slow",
        html("slow").set_delay(Duration::from_secs(2)),
    )
    .await;

    let fetcher = HttpFetcher::new("RippleTest/1.0").unwrap();

    let gone = fetcher
        .fetch(&format!("{}/gone", mock_server.uri()), Duration::from_secs(2))
        .await;
    assert!(matches!(gone, Err(FetchError::Status { status: 404, .. })));

    let slow = fetcher
        .fetch(&format!("{}/slow", mock_server.uri()), Duration::from_millis(200))
        .await;
    assert!(matches!(slow, Err(FetchError::Timeout { .. })));
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    use wiremock::matchers::header;

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "RippleTest/1.0"))
        .respond_with(html("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new("RippleTest/1.0").unwrap();
    let page = fetcher
        .fetch(&format!("{}/", mock_server.uri()), Duration::from_secs(2))
        .await
        .unwrap();
    assert!(page.text().contains("hello"));
}
