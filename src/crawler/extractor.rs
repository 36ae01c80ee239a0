//! Content extraction from a parsed page
//!
//! Pulls the fields that are indexed (title, description, main content), the
//! canonical URL, the meta robots directives, and the followable anchors.

use crate::crawler::query::Query;
use crate::robots::RobotsDirectives;
use crate::url::filter_links;
use scraper::Html;
use url::Url;

/// Fields extracted from one HTML document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub description: Option<String>,

    /// Serialized HTML of the main content subtree
    pub content: Option<String>,

    /// Absolute canonical URL, or the page URL when none is declared
    pub canonical: String,

    /// Directives from `<meta name="robots">`
    pub robots: RobotsDirectives,
}

/// Parses `html` fetched from `page` and extracts its indexable fields
///
/// # Example
///
/// ```
/// use pagewell::crawler::extract;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/a").unwrap();
/// let html = r#"<html><head><title> Hello </title></head><body><p>Hi</p></body></html>"#;
/// let extracted = extract(html, &page);
/// assert_eq!(extracted.title.as_deref(), Some("Hello"));
/// assert_eq!(extracted.canonical, "https://example.com/a");
/// ```
pub fn extract(html: &str, page: &Url) -> ExtractedContent {
    let document = Html::parse_document(html);
    extract_document(&document, page)
}

pub(crate) fn extract_document(document: &Html, page: &Url) -> ExtractedContent {
    ExtractedContent {
        title: find_title(document),
        description: find_description(document),
        content: find_content(document),
        canonical: find_canonical(document, page),
        robots: find_meta_robots(document),
    }
}

/// Text of the first `<title>`, falling back to `<meta name="title">`
fn find_title(document: &Html) -> Option<String> {
    let from_title = Query::tag("title")
        .first(document)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty());

    from_title.or_else(|| {
        Query::tag("meta")
            .attr_eq("name", "title")
            .first_attr(document, "content")
            .map(str::to_string)
    })
}

fn find_description(document: &Html) -> Option<String> {
    Query::tag("meta")
        .attr_eq("name", "description")
        .first_attr(document, "content")
        .map(str::to_string)
}

/// Serializes the main content subtree
///
/// Tiers, first match wins: a `<main>` without `hidden`, any element with
/// `role="main"`, then `<body>`.
fn find_content(document: &Html) -> Option<String> {
    let tiers = [
        Query::tag("main").without_attr("hidden"),
        Query::any().attr_eq("role", "main"),
        Query::tag("body"),
    ];

    tiers
        .iter()
        .find_map(|query| query.first(document))
        .map(|element| element.html())
}

/// Resolves the first non-blank `<link rel="canonical">` against the page
///
/// An href that cannot be resolved is kept as written.
fn find_canonical(document: &Html, page: &Url) -> String {
    let href = Query::tag("link")
        .attr_has_token("rel", "canonical")
        .first_attr(document, "href");

    match href {
        Some(href) => page
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => page.to_string(),
    }
}

/// Union of every `<meta name="robots">` tag on the page
fn find_meta_robots(document: &Html) -> RobotsDirectives {
    Query::tag("meta")
        .attr_eq("name", "robots")
        .all(document)
        .filter_map(|element| element.value().attr("content"))
        .map(|content| RobotsDirectives::parse(Some(content)))
        .fold(RobotsDirectives::default(), RobotsDirectives::merge)
}

/// Collects followable anchors and filters them into queueable links
///
/// Anchors need a non-blank `href` and no `nofollow` token in `rel`.
pub fn find_links(document: &Html, page: &Url) -> Vec<Url> {
    let followable = Query::tag("a").attr_non_blank("href");
    let nofollow = Query::tag("a").attr_has_token("rel", "nofollow");

    let hrefs: Vec<&str> = followable
        .all(document)
        .filter(|element| !nofollow.matches(element))
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .collect();

    filter_links(hrefs, page)
}
