//! Integration tests for the conditional fetch state machine
//!
//! These tests use wiremock to serve pages and check which requests the scraper
//! makes and which outcome it reaches.

use chrono::{Duration, TimeZone, Utc};
use pagewell::config::UserAgentConfig;
use pagewell::crawler::build_http_client;
use pagewell::{PriorValidators, ScrapeOutcome, Scraper};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CACHE_AGE: u64 = 600;

fn scraper() -> Scraper {
    let config = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    };
    Scraper::new(
        build_http_client(&config).expect("Failed to build client"),
        CACHE_AGE,
    )
}

fn page_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).expect("Failed to parse page URL")
}

fn html_head() -> ResponseTemplate {
    ResponseTemplate::new(200).insert_header("content-type", "text/html; charset=utf-8")
}

fn html_body(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn mount_head(server: &MockServer, page: &str, response: ResponseTemplate) {
    Mock::given(method("HEAD"))
        .and(path(page))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts a GET that must be requested exactly `times` times
async fn mount_get(server: &MockServer, page: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title> Article </title>
    <meta name="description" content=" A short article ">
</head>
<body>
    <nav><a href="https://example.com/">Home</a></nav>
    <main>
        <p>Body text</p>
        <a href="https://example.com/next">Next</a>
        <a href="https://example.com/next">Next again</a>
        <a href="http://example.com/insecure">Insecure</a>
        <a href="https://example.com/private" rel="nofollow">Private</a>
        <a href="https://example.com">Root</a>
    </main>
</body>
</html>"#;

#[tokio::test]
async fn test_matching_etag_is_unchanged_without_get() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head().insert_header("etag", "\"abc123\"")).await;
    mount_get(&server, "/page", html_body(ARTICLE), 0).await;

    let prior = PriorValidators {
        etag: Some("abc123".to_string()),
        last_modified: None,
    };
    let outcome = scraper().scrape(&page_url(&server, "/page"), &prior).await;
    assert_eq!(outcome, ScrapeOutcome::Unchanged);
}

#[tokio::test]
async fn test_weak_etag_matches_strong_prior() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head().insert_header("etag", "W/\"abc123\"")).await;
    mount_get(&server, "/page", html_body(ARTICLE), 0).await;

    let prior = PriorValidators {
        etag: Some("abc123".to_string()),
        last_modified: None,
    };
    let outcome = scraper().scrape(&page_url(&server, "/page"), &prior).await;
    assert_eq!(outcome, ScrapeOutcome::Unchanged);
}

#[tokio::test]
async fn test_changed_etag_fetches_page() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head().insert_header("etag", "\"v2\"")).await;
    mount_get(
        &server,
        "/page",
        html_body(ARTICLE).insert_header("etag", "\"v2\""),
        1,
    )
    .await;

    let prior = PriorValidators {
        etag: Some("v1".to_string()),
        last_modified: None,
    };
    match scraper().scrape(&page_url(&server, "/page"), &prior).await {
        ScrapeOutcome::Success(page) => assert_eq!(page.etag.as_deref(), Some("v2")),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_head_error_status_is_failed_without_get() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", ResponseTemplate::new(500)).await;
    mount_get(&server, "/page", html_body(ARTICLE), 0).await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::Failed { status: 500 });
}

#[tokio::test]
async fn test_get_error_status_is_failed() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head()).await;
    mount_get(&server, "/page", ResponseTemplate::new(404), 1).await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::Failed { status: 404 });
}

#[tokio::test]
async fn test_transport_failure_is_599() {
    // Nothing listens on port 1
    let url = Url::parse("http://127.0.0.1:1/page").unwrap();
    let outcome = scraper().scrape(&url, &PriorValidators::default()).await;
    assert_eq!(outcome, ScrapeOutcome::Failed { status: 599 });
    assert!(outcome.is_transport_failure());
}

#[tokio::test]
async fn test_non_html_is_not_indexable() {
    let server = MockServer::start().await;
    mount_head(
        &server,
        "/file.pdf",
        ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
    )
    .await;
    mount_get(&server, "/file.pdf", html_body(ARTICLE), 0).await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/file.pdf"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::NotIndexable);
}

#[tokio::test]
async fn test_missing_content_type_is_not_indexable() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", ResponseTemplate::new(200)).await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::NotIndexable);
}

#[tokio::test]
async fn test_noindex_header_is_not_indexable() {
    let server = MockServer::start().await;
    mount_head(
        &server,
        "/page",
        html_head().insert_header("x-robots-tag", "NoIndex, nofollow"),
    )
    .await;
    mount_get(&server, "/page", html_body(ARTICLE), 0).await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::NotIndexable);
}

#[tokio::test]
async fn test_noindex_meta_is_not_indexable() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head()).await;
    mount_get(
        &server,
        "/page",
        html_body(r#"<html><head><meta name="robots" content="noindex"></head><body>x</body></html>"#),
        1,
    )
    .await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::NotIndexable);
}

#[tokio::test]
async fn test_last_modified_not_newer_is_unchanged() {
    let server = MockServer::start().await;
    mount_head(
        &server,
        "/page",
        html_head().insert_header("last-modified", "Mon, 01 Jan 2024 00:00:00 GMT"),
    )
    .await;
    mount_get(&server, "/page", html_body(ARTICLE), 0).await;

    let prior = PriorValidators {
        etag: None,
        last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
    };
    let outcome = scraper().scrape(&page_url(&server, "/page"), &prior).await;
    assert_eq!(outcome, ScrapeOutcome::Unchanged);
}

#[tokio::test]
async fn test_newer_last_modified_fetches_page() {
    let server = MockServer::start().await;
    let modified = "Tue, 02 Jan 2024 00:00:00 GMT";
    mount_head(&server, "/page", html_head().insert_header("last-modified", modified)).await;
    mount_get(
        &server,
        "/page",
        html_body(ARTICLE).insert_header("last-modified", modified),
        1,
    )
    .await;

    let prior = PriorValidators {
        etag: None,
        last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
    };
    match scraper().scrape(&page_url(&server, "/page"), &prior).await {
        ScrapeOutcome::Success(page) => assert_eq!(
            page.last_modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        ),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_success_extracts_fields_and_links() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head()).await;
    mount_get(
        &server,
        "/page",
        html_body(ARTICLE).insert_header("cache-control", "public, max-age=86400"),
        1,
    )
    .await;

    let url = page_url(&server, "/page");
    let before = Utc::now();
    let page = match scraper().scrape(&url, &PriorValidators::default()).await {
        ScrapeOutcome::Success(page) => page,
        other => panic!("expected success, got {:?}", other),
    };

    assert_eq!(page.status, 200);
    assert_eq!(page.title.as_deref(), Some("Article"));
    assert_eq!(page.description.as_deref(), Some("A short article"));
    let content = page.content.expect("main content");
    assert!(content.starts_with("<main>"));
    assert!(content.contains("Body text"));
    assert!(!content.contains("<nav>"));
    assert_eq!(page.canonical, url.to_string());
    assert_eq!(page.etag, None);

    let hrefs: Vec<String> = page.hrefs.iter().map(|u| u.to_string()).collect();
    assert_eq!(hrefs, vec!["https://example.com/next"]);

    assert!(page.next_scrape_after >= before + Duration::seconds(86400));
}

#[tokio::test]
async fn test_nofollow_header_drops_links() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head().insert_header("x-robots-tag", "nofollow")).await;
    mount_get(&server, "/page", html_body(ARTICLE), 1).await;

    match scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await
    {
        ScrapeOutcome::Success(page) => {
            assert!(page.hrefs.is_empty());
            assert!(page.content.is_some());
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_nofollow_meta_drops_links() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head()).await;
    let body = ARTICLE.replace(
        "<title>",
        r#"<meta name="robots" content="nofollow"><title>"#,
    );
    mount_get(&server, "/page", html_body(&body), 1).await;

    match scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await
    {
        ScrapeOutcome::Success(page) => assert!(page.hrefs.is_empty()),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_canonical_link_is_resolved() {
    let server = MockServer::start().await;
    mount_head(&server, "/page", html_head()).await;
    mount_get(
        &server,
        "/page",
        html_body(r#"<html><head><link rel="canonical" href="/article"></head><body>x</body></html>"#),
        1,
    )
    .await;

    match scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await
    {
        ScrapeOutcome::Success(page) => {
            assert_eq!(page.canonical, page_url(&server, "/article").to_string())
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_requests_carry_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .and(header(
            "user-agent",
            format!(
                "TestBot/1.0.0 (+https://example.com/contact; pid:{})",
                std::process::id()
            )
            .as_str(),
        ))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = scraper()
        .scrape(&page_url(&server, "/page"), &PriorValidators::default())
        .await;
    assert_eq!(outcome, ScrapeOutcome::Failed { status: 503 });
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let server = MockServer::start().await;
    let target = page_url(&server, "/new");
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", target.as_str()))
        .mount(&server)
        .await;
    mount_head(&server, "/new", html_head()).await;
    mount_get(&server, "/new", html_body("<title>Moved</title>"), 1).await;

    match scraper()
        .scrape(&page_url(&server, "/old"), &PriorValidators::default())
        .await
    {
        ScrapeOutcome::Success(page) => assert_eq!(page.title.as_deref(), Some("Moved")),
        other => panic!("expected success, got {:?}", other),
    }
}
