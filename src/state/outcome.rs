/// Scrape outcome definitions
///
/// A scrape attempt ends in exactly one of these outcomes. Only their fields are
/// folded back into the queue row; the outcome itself is never stored.
use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

/// Synthetic status recorded when the request never produced an HTTP response
/// (DNS, TLS, connection, or body read failure)
pub const TRANSPORT_FAILURE_STATUS: u16 = 599;

/// Status recorded when processing a target failed with an error rather than an
/// HTTP status
pub const EXCEPTION_STATUS: u16 = 0;

/// Status recorded when the caching validators showed the page is unchanged
pub const NOT_MODIFIED_STATUS: u16 = 304;

/// Caching metadata remembered from the previous successful scrape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorValidators {
    /// Normalized ETag (no `W/` marker, no quotes)
    pub etag: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,
}

/// Everything extracted from a page that was fetched and may be indexed
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,

    /// Serialized HTML of the main content subtree
    pub content: Option<String>,

    /// Links to queue, already filtered
    pub hrefs: Vec<Url>,

    /// The page's declared canonical URL, or the request URL when none is declared
    pub canonical: String,

    /// HTTP status of the GET (always 200)
    pub status: u16,

    /// Earliest instant the page should be scraped again
    pub next_scrape_after: DateTime<Utc>,
}

/// The result of one scrape attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// The page was fetched and may be indexed
    Success(ScrapedPage),

    /// The ETag or Last-Modified validators show the page has not changed
    Unchanged,

    /// The page is not HTML, or a robots directive forbids indexing it
    NotIndexable,

    /// The HEAD or GET returned a non-200 status, or failed in transport (599)
    Failed { status: u16 },
}

impl ScrapeOutcome {
    /// The status recorded as `last_scrape_status` for this outcome
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success(page) => page.status,
            Self::Unchanged => NOT_MODIFIED_STATUS,
            Self::NotIndexable => 200,
            Self::Failed { status } => *status,
        }
    }

    /// Returns true if the failure never reached an HTTP server
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Failed { status } if *status == TRANSPORT_FAILURE_STATUS)
    }

    /// Short label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Unchanged => "unchanged",
            Self::NotIndexable => "not_indexable",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ScrapeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { status } => write!(f, "failed ({})", status),
            other => f.write_str(other.label()),
        }
    }
}
