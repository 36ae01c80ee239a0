use crate::state::ScrapedPage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

/// Namespace for document ids derived from URLs
///
/// Changing it orphans every document already in the index.
pub const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x1f0365d8_2a44_6ef0_a5ff_7804559ef9c4);

/// Derives the index document id for a URL string
///
/// The id is a name-based (v5) UUID, so scraping the same canonical URL again
/// overwrites the existing document instead of adding a second one.
///
/// # Examples
///
/// ```
/// use pagewell::index::document_id;
///
/// assert_eq!(
///     document_id("https://example.com/a"),
///     document_id("https://example.com/a")
/// );
/// assert_ne!(
///     document_id("https://example.com/a"),
///     document_id("https://example.com/b")
/// );
/// ```
pub fn document_id(url: &str) -> Uuid {
    Uuid::new_v5(&DOCUMENT_NAMESPACE, url.as_bytes())
}

/// The document written to the search index for one scraped page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDocument {
    pub canonical_url: String,
    pub content: Option<String>,
    pub description: Option<String>,
    pub etag: Option<String>,
    pub last_scraped: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub title: Option<String>,
}

impl IndexDocument {
    pub fn from_page(page: &ScrapedPage, scraped_at: DateTime<Utc>) -> Self {
        Self {
            canonical_url: page.canonical.clone(),
            content: page.content.clone(),
            description: page.description.clone(),
            etag: page.etag.clone(),
            last_scraped: scraped_at,
            last_updated: page.last_modified,
            title: page.title.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        document_id(&self.canonical_url)
    }
}

/// One action in a bulk request
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Write a document through the ingest pipeline, replacing any prior version
    Index { id: Uuid, document: IndexDocument },

    Delete { id: Uuid },
}

impl BulkOperation {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Index { .. } => "index",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Index { id, .. } | Self::Delete { id } => *id,
        }
    }
}

/// Builds the bulk operations that publish a scraped page
///
/// The page is indexed under its canonical URL. When the URL it was requested from
/// differs, any document stored under the request URL is deleted so the page is
/// only searchable under one identity.
pub fn handoff_operations(
    request_url: &Url,
    page: &ScrapedPage,
    scraped_at: DateTime<Utc>,
) -> Vec<BulkOperation> {
    let document = IndexDocument::from_page(page, scraped_at);
    let mut operations = vec![BulkOperation::Index {
        id: document.id(),
        document,
    }];

    if request_url.as_str() != page.canonical {
        operations.push(BulkOperation::Delete {
            id: document_id(request_url.as_str()),
        });
    }

    operations
}
