//! Storage traits and error types
//!
//! This module defines the trait interface for queue backends and associated
//! error types.

use crate::storage::{
    ClaimStrategy, EnqueueOutcome, QueueStats, ScrapeRecord, ScrapeTarget, UrlBase,
};
use crate::UrlError;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Scrape target not found: {0}")]
    TargetNotFound(i64),

    #[error("Invalid url prefix: {0:?}")]
    InvalidPrefix(String),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for queue backend implementations
///
/// Every method is a single short statement against the shared store, so callers
/// never hold a database transaction across network I/O. `claim` is the only
/// cross-process synchronization point: it selects and locks one row atomically.
pub trait QueueStore {
    // ===== Url Bases =====

    /// Registers a url base, returning the id of the new or existing row
    fn add_url_base(&self, url_prefix: &str) -> StorageResult<i64>;

    /// Lists all registered url bases ordered by id
    fn list_url_bases(&self) -> StorageResult<Vec<UrlBase>>;

    // ===== Claiming =====

    /// Atomically picks one eligible row and locks it for `holder`
    ///
    /// A row is eligible when it is unlocked and has never been checked.
    /// Returns `None` when no row is eligible.
    fn claim(&self, strategy: ClaimStrategy, holder: &str) -> StorageResult<Option<ScrapeTarget>>;

    /// Clears the lock on a row, whoever holds it
    fn release(&self, target_id: i64) -> StorageResult<()>;

    // ===== Attempt Results =====

    /// Records a successful scrape: validators, status, check time, and schedule
    fn record_scrape(&self, target_id: i64, record: &ScrapeRecord) -> StorageResult<()>;

    /// Records an attempt that produced no new content
    ///
    /// The stored validators are kept. `no_scrape_before` is only overwritten when
    /// a value is given.
    fn record_check(
        &self,
        target_id: i64,
        status: u16,
        no_scrape_before: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    // ===== Link Discovery =====

    /// Queues a discovered URL under the url base with the longest matching prefix
    ///
    /// Idempotent: an existing row for the same base and path is left untouched.
    fn enqueue(&self, href: &Url) -> StorageResult<EnqueueOutcome>;

    // ===== Inspection =====

    /// Loads a row by id
    fn get_target(&self, target_id: i64) -> StorageResult<Option<ScrapeTarget>>;

    /// Counts rows by check and lock state
    fn queue_stats(&self) -> StorageResult<QueueStats>;
}
