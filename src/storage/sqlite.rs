//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the QueueStore trait.
//! Several worker processes may open the same database file; WAL mode plus a busy
//! timeout lets their short statements interleave.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{QueueStore, StorageError, StorageResult};
use crate::storage::{
    ClaimLock, ClaimStrategy, EnqueueOutcome, QueueStats, ScrapeRecord, ScrapeTarget, UrlBase,
};
use crate::url::{prefix_key, queue_path};
use crate::PagewellError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// How long a statement waits on another process's write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns returned for every scrape target query, joined with the base prefix
const TARGET_COLUMNS: &str = "id, url_base_id, path, etag, last_modified, last_check_time,
    last_scrape_status, no_scrape_before, lock_holder, lock_claimed_at,
    (SELECT url_prefix FROM url_bases WHERE url_bases.id = scraped_urls.url_base_id) AS url_prefix";

/// Rows that have never been checked and are not locked
const ELIGIBLE: &str = "lock_holder IS NULL AND last_check_time IS NULL";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the queue database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(PagewellError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PagewellError> {
        let conn = Connection::open(path)?;

        // Must be set before the WAL switch, which itself needs the write lock
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PagewellError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn claim_sql(strategy: ClaimStrategy) -> String {
        let candidate = match strategy {
            ClaimStrategy::Random => format!(
                "SELECT id FROM scraped_urls WHERE {ELIGIBLE} ORDER BY RANDOM() LIMIT 1"
            ),
            ClaimStrategy::RandomByBase => format!(
                "SELECT id FROM scraped_urls
                 WHERE {ELIGIBLE} AND url_base_id = (
                     SELECT url_base_id FROM scraped_urls
                     WHERE {ELIGIBLE}
                     GROUP BY url_base_id
                     ORDER BY RANDOM() LIMIT 1
                 )
                 ORDER BY RANDOM() LIMIT 1"
            ),
            ClaimStrategy::WithinBase(_) => format!(
                "SELECT id FROM scraped_urls
                 WHERE {ELIGIBLE} AND url_base_id = ?3
                 ORDER BY RANDOM() LIMIT 1"
            ),
        };

        // The outer lock_holder check keeps the update a no-op if another
        // connection won the row between candidate selection and write.
        format!(
            "UPDATE scraped_urls
             SET lock_holder = ?1, lock_claimed_at = ?2
             WHERE id = ({candidate}) AND lock_holder IS NULL
             RETURNING id"
        )
    }

    /// Finds the url base whose prefix is the longest prefix of `key`
    ///
    /// The host and port part of a prefix must equal the key's exactly; only the
    /// path part matches as a string prefix. A prefix without a path therefore has
    /// to be followed by the `/` that starts the key's path.
    fn matching_base(&self, key: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM url_bases
                 WHERE substr(?1, 1, length(url_prefix)) = url_prefix
                   AND (instr(url_prefix, '/') > 0
                        OR substr(?1, length(url_prefix) + 1, 1) = '/')
                 ORDER BY length(url_prefix) DESC, id ASC
                 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn target_from_row(row: &Row) -> rusqlite::Result<ScrapeTarget> {
        let holder: Option<String> = row.get("lock_holder")?;
        let claimed_at = parse_timestamp(row.get("lock_claimed_at")?);
        let lock = match (holder, claimed_at) {
            (Some(holder), Some(claimed_at)) => Some(ClaimLock { holder, claimed_at }),
            _ => None,
        };

        Ok(ScrapeTarget {
            id: row.get("id")?,
            url_base_id: row.get("url_base_id")?,
            url_prefix: row.get("url_prefix")?,
            path: row.get("path")?,
            etag: row.get("etag")?,
            last_modified: parse_timestamp(row.get("last_modified")?),
            last_check_time: parse_timestamp(row.get("last_check_time")?),
            last_scrape_status: row.get("last_scrape_status")?,
            no_scrape_before: parse_timestamp(row.get("no_scrape_before")?),
            lock,
        })
    }

    fn ensure_updated(changed: usize, target_id: i64) -> StorageResult<()> {
        if changed == 0 {
            return Err(StorageError::TargetNotFound(target_id));
        }
        Ok(())
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

impl QueueStore for SqliteStorage {
    // ===== Url Bases =====

    fn add_url_base(&self, url_prefix: &str) -> StorageResult<i64> {
        let url_prefix = url_prefix.trim();
        if url_prefix.is_empty() || url_prefix.contains("://") {
            return Err(StorageError::InvalidPrefix(url_prefix.to_string()));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO url_bases (url_prefix) VALUES (?1)",
            params![url_prefix],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM url_bases WHERE url_prefix = ?1",
            params![url_prefix],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_url_bases(&self) -> StorageResult<Vec<UrlBase>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, url_prefix FROM url_bases ORDER BY id")?;

        let bases = stmt
            .query_map([], |row| {
                Ok(UrlBase {
                    id: row.get(0)?,
                    url_prefix: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(bases)
    }

    // ===== Claiming =====

    fn claim(&self, strategy: ClaimStrategy, holder: &str) -> StorageResult<Option<ScrapeTarget>> {
        let sql = Self::claim_sql(strategy);
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare(&sql)?;

        let claimed: Option<i64> = match strategy {
            ClaimStrategy::WithinBase(base_id) => stmt
                .query_row(params![holder, now, base_id], |row| row.get(0))
                .optional()?,
            ClaimStrategy::Random | ClaimStrategy::RandomByBase => stmt
                .query_row(params![holder, now], |row| row.get(0))
                .optional()?,
        };

        let Some(target_id) = claimed else {
            return Ok(None);
        };

        // The row is ours now; give it back if it cannot be loaded
        match self.get_target(target_id) {
            Ok(target) => Ok(target),
            Err(e) => {
                self.release(target_id)?;
                Err(e)
            }
        }
    }

    fn release(&self, target_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scraped_urls SET lock_holder = NULL, lock_claimed_at = NULL WHERE id = ?1",
            params![target_id],
        )?;
        Ok(())
    }

    // ===== Attempt Results =====

    fn record_scrape(&self, target_id: i64, record: &ScrapeRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE scraped_urls
             SET etag = ?1, last_modified = ?2, last_check_time = ?3,
                 last_scrape_status = ?4, no_scrape_before = ?5
             WHERE id = ?6",
            params![
                record.etag,
                format_timestamp(record.last_modified),
                now,
                record.status,
                record.no_scrape_before.to_rfc3339(),
                target_id
            ],
        )?;
        Self::ensure_updated(changed, target_id)
    }

    fn record_check(
        &self,
        target_id: i64,
        status: u16,
        no_scrape_before: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE scraped_urls
             SET last_check_time = ?1, last_scrape_status = ?2,
                 no_scrape_before = COALESCE(?3, no_scrape_before)
             WHERE id = ?4",
            params![now, status, format_timestamp(no_scrape_before), target_id],
        )?;
        Self::ensure_updated(changed, target_id)
    }

    // ===== Link Discovery =====

    fn enqueue(&self, href: &url::Url) -> StorageResult<EnqueueOutcome> {
        let key = prefix_key(href)?;
        let Some(base_id) = self.matching_base(&key)? else {
            return Ok(EnqueueOutcome::NoMatchingBase);
        };

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO scraped_urls (url_base_id, path) VALUES (?1, ?2)",
            params![base_id, queue_path(href)],
        )?;

        if inserted == 0 {
            Ok(EnqueueOutcome::AlreadyQueued)
        } else {
            Ok(EnqueueOutcome::Inserted {
                id: self.conn.last_insert_rowid(),
                url_base_id: base_id,
            })
        }
    }

    // ===== Inspection =====

    fn get_target(&self, target_id: i64) -> StorageResult<Option<ScrapeTarget>> {
        let sql = format!("SELECT {TARGET_COLUMNS} FROM scraped_urls WHERE id = ?1");
        let target = self
            .conn
            .query_row(&sql, params![target_id], Self::target_from_row)
            .optional()?;
        Ok(target)
    }

    fn queue_stats(&self) -> StorageResult<QueueStats> {
        let mut stats = self.conn.query_row(
            &format!(
                "SELECT COUNT(*),
                        COUNT(last_check_time),
                        COUNT(lock_holder),
                        COALESCE(SUM(CASE WHEN {ELIGIBLE} THEN 1 ELSE 0 END), 0)
                 FROM scraped_urls"
            ),
            [],
            |row| {
                Ok(QueueStats {
                    total: count(row.get(0)?),
                    checked: count(row.get(1)?),
                    locked: count(row.get(2)?),
                    pending: count(row.get(3)?),
                    by_status: Vec::new(),
                })
            },
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT last_scrape_status, COUNT(*) FROM scraped_urls
             WHERE last_scrape_status IS NOT NULL
             GROUP BY last_scrape_status
             ORDER BY last_scrape_status",
        )?;
        stats.by_status = stmt
            .query_map([], |row| Ok((row.get(0)?, count(row.get(1)?))))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}
