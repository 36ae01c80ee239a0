//! Storage module for the shared scrape queue
//!
//! This module handles all database operations for the scraper, including:
//! - SQLite database initialization and schema management
//! - Atomic claiming and releasing of scrape targets
//! - Recording attempt results and caching validators
//! - Queueing discovered links under their url base

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{QueueStore, StorageError, StorageResult};

use crate::PagewellError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(PagewellError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, PagewellError> {
    SqliteStorage::new(path)
}

/// A registered crawl domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBase {
    pub id: i64,

    /// Host plus optional leading path, without scheme (e.g. `example.com/docs`)
    pub url_prefix: String,
}

/// The lock a worker holds on a queue row while processing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimLock {
    pub holder: String,
    pub claimed_at: DateTime<Utc>,
}

/// One page in the queue, joined with its url base prefix
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeTarget {
    pub id: i64,
    pub url_base_id: i64,
    pub url_prefix: String,

    /// Absolute path plus query, relative to the base host
    pub path: String,

    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_scrape_status: Option<u16>,
    pub no_scrape_before: Option<DateTime<Utc>>,
    pub lock: Option<ClaimLock>,
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}{}", self.id, self.url_prefix, self.path)
    }
}

/// Fields written back after a successful scrape
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRecord {
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub status: u16,
    pub no_scrape_before: DateTime<Utc>,
}

/// How a worker picks the next row to claim
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimStrategy {
    /// Uniformly random over all eligible rows
    Random,

    /// Pick a random base that has eligible rows, then a random row within it
    #[default]
    RandomByBase,

    /// Random row within the given url base only
    WithinBase(i64),
}

impl fmt::Display for ClaimStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::RandomByBase => f.write_str("random-by-base"),
            Self::WithinBase(id) => write!(f, "within-base({})", id),
        }
    }
}

/// Result of queueing a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new row was created
    Inserted { id: i64, url_base_id: i64 },

    /// A row with the same base and path already exists
    AlreadyQueued,

    /// The link lies outside every registered url base
    NoMatchingBase,
}

/// Row counts over the whole queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,

    /// Rows with a recorded check time
    pub checked: u64,

    /// Rows currently locked by some worker
    pub locked: u64,

    /// Rows a worker could claim right now
    pub pending: u64,

    /// Row count per last recorded status
    pub by_status: Vec<(u16, u64)>,
}

/// Holds the lock on a claimed row and clears it when dropped
///
/// Every exit from a processing cycle, including early returns and errors, passes
/// through `Drop`, so a claimed row is never left locked by a live worker.
pub struct ClaimGuard<'a, Q: QueueStore + ?Sized> {
    store: &'a Q,
    target: ScrapeTarget,
    armed: bool,
}

impl<'a, Q: QueueStore + ?Sized> ClaimGuard<'a, Q> {
    /// Claims one row with `strategy`, returning `None` when the queue is idle
    pub fn claim(store: &'a Q, strategy: ClaimStrategy, holder: &str) -> StorageResult<Option<Self>> {
        Ok(store.claim(strategy, holder)?.map(|target| Self {
            store,
            target,
            armed: true,
        }))
    }

    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    /// Releases the lock now, surfacing any error instead of logging it
    ///
    /// On failure the guard stays armed, so dropping it tries the release once more.
    pub fn release(mut self) -> StorageResult<()> {
        self.store.release(self.target.id)?;
        self.armed = false;
        Ok(())
    }
}

impl<Q: QueueStore + ?Sized> Drop for ClaimGuard<'_, Q> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.store.release(self.target.id) {
            tracing::error!(target_id = self.target.id, error = %e, "Failed to release claim");
        }
    }
}
