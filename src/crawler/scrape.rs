//! Conditional fetch state machine
//!
//! One call to [`Scraper::scrape`] probes the page with HEAD, stops early when the
//! page cannot be indexed or has not changed, and otherwise fetches, parses, and
//! extracts it. Every path ends in exactly one [`ScrapeOutcome`].

use crate::crawler::extractor::{extract_document, find_links};
use crate::crawler::fetcher::{fetch, FetchResponse};
use crate::crawler::schedule::{next_scrape_after, parse_http_date};
use crate::robots::RobotsDirectives;
use crate::state::{PriorValidators, ScrapeOutcome, ScrapedPage};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use scraper::Html;
use url::Url;

/// Strips the weak validator marker and surrounding quotes from an ETag
///
/// Weak and strong validators compare equal once normalized.
///
/// # Examples
///
/// ```
/// use pagewell::crawler::normalize_etag;
///
/// assert_eq!(normalize_etag("W/\"x\""), "x");
/// assert_eq!(normalize_etag("\"x\""), "x");
/// assert_eq!(normalize_etag("x"), "x");
/// ```
pub fn normalize_etag(etag: &str) -> &str {
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    let etag = etag.strip_prefix('"').unwrap_or(etag);
    etag.strip_suffix('"').unwrap_or(etag)
}

/// Normalized ETag from a header value, `None` if absent or empty
pub fn parse_etag(value: Option<&str>) -> Option<String> {
    value
        .map(normalize_etag)
        .filter(|etag| !etag.is_empty())
        .map(str::to_string)
}

/// Runs the conditional fetch for one page
#[derive(Debug, Clone)]
pub struct Scraper {
    client: Client,
    default_cache_age: u64,
}

impl Scraper {
    /// Creates a scraper
    ///
    /// `default_cache_age` is the minimum re-scrape interval in seconds.
    pub fn new(client: Client, default_cache_age: u64) -> Self {
        Self {
            client,
            default_cache_age,
        }
    }

    /// Scrapes `page`, comparing against the validators from its previous scrape
    pub async fn scrape(&self, page: &Url, prior: &PriorValidators) -> ScrapeOutcome {
        // HEAD probe
        let head = fetch(&self.client, Method::HEAD, page).await;
        if head.status != 200 {
            tracing::info!(url = %page, status = head.status, "HEAD request failed");
            return ScrapeOutcome::Failed {
                status: head.status,
            };
        }

        let header_robots = RobotsDirectives::parse(head.header("x-robots-tag").as_deref());
        if header_robots.noindex {
            tracing::info!(url = %page, "Skipping page with noindex robots header");
            return ScrapeOutcome::NotIndexable;
        }

        if !is_html(&head) {
            tracing::info!(
                url = %page,
                content_type = ?head.header("content-type"),
                "Skipping non-HTML page"
            );
            return ScrapeOutcome::NotIndexable;
        }

        if is_unchanged(&head, prior) {
            tracing::info!(url = %page, "Page unchanged since last scrape");
            return ScrapeOutcome::Unchanged;
        }

        // Full fetch
        let get = fetch(&self.client, Method::GET, page).await;
        if get.status != 200 {
            tracing::info!(url = %page, status = get.status, "GET request failed");
            return ScrapeOutcome::Failed { status: get.status };
        }

        let now = Utc::now();
        let next = next_scrape_after(
            now,
            self.default_cache_age,
            get.header("cache-control").as_deref(),
            get.header("expires").as_deref(),
        );

        let body = get.body.as_deref().unwrap_or_default();
        self.build_outcome(page, &get, body, header_robots, next)
    }

    fn build_outcome(
        &self,
        page: &Url,
        get: &FetchResponse,
        body: &str,
        header_robots: RobotsDirectives,
        next_scrape_after: DateTime<Utc>,
    ) -> ScrapeOutcome {
        let document = Html::parse_document(body);
        let extracted = extract_document(&document, page);

        let robots = header_robots.merge(extracted.robots);
        if robots.noindex {
            tracing::info!(url = %page, "Skipping page with noindex meta robots tag");
            return ScrapeOutcome::NotIndexable;
        }

        let hrefs = if robots.nofollow {
            tracing::debug!(url = %page, "Not following links on nofollow page");
            Vec::new()
        } else {
            find_links(&document, page)
        };

        ScrapeOutcome::Success(ScrapedPage {
            etag: parse_etag(get.header("etag").as_deref()),
            last_modified: get.header("last-modified").as_deref().and_then(parse_http_date),
            title: extracted.title,
            description: extracted.description,
            content: extracted.content,
            hrefs,
            canonical: extracted.canonical,
            status: get.status,
            next_scrape_after,
        })
    }
}

fn is_html(response: &FetchResponse) -> bool {
    response
        .header("content-type")
        .is_some_and(|content_type| content_type.starts_with("text/html"))
}

/// Checks the HEAD validators against the previous scrape
///
/// An ETag match or a Last-Modified at or before the stored one means unchanged.
/// An empty or unparseable header never does.
fn is_unchanged(head: &FetchResponse, prior: &PriorValidators) -> bool {
    let etag_matches = match (parse_etag(head.header("etag").as_deref()), &prior.etag) {
        (Some(current), Some(prior)) => &current == prior,
        _ => false,
    };
    if etag_matches {
        return true;
    }

    match (
        head.header("last-modified").as_deref().and_then(parse_http_date),
        prior.last_modified,
    ) {
        (Some(current), Some(prior)) => current <= prior,
        _ => false,
    }
}
