//! Crawler module for scraping queued pages
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with transport failures mapped to a synthetic status
//! - The HEAD/GET conditional fetch state machine
//! - Content and link extraction from parsed HTML
//! - Re-scrape scheduling from cache headers
//! - The worker loop that drives all of it against the shared queue

mod extractor;
mod fetcher;
mod query;
mod schedule;
mod scrape;
mod worker;

pub use extractor::{extract, find_links, ExtractedContent};
pub use fetcher::{build_http_client, fetch, header_value, FetchResponse};
pub use query::Query;
pub use schedule::{next_scrape_after, parse_http_date};
pub use scrape::{normalize_etag, parse_etag, Scraper};
pub use worker::{CycleReport, Worker, WorkerSummary};
