//! Database schema definitions
//!
//! This module contains the SQL schema for the shared scrape queue.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered crawl domains, seeded by operators
CREATE TABLE IF NOT EXISTS url_bases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_prefix TEXT NOT NULL UNIQUE
);

-- One row per page ever queued; the durable crawl history
CREATE TABLE IF NOT EXISTS scraped_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_base_id INTEGER NOT NULL REFERENCES url_bases(id),
    path TEXT NOT NULL,
    etag TEXT,
    last_modified TEXT,
    last_check_time TEXT,
    last_scrape_status INTEGER,
    no_scrape_before TEXT,
    lock_holder TEXT,
    lock_claimed_at TEXT,
    UNIQUE(url_base_id, path),
    CHECK ((lock_holder IS NULL) = (lock_claimed_at IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_scraped_urls_eligible
    ON scraped_urls(url_base_id)
    WHERE lock_holder IS NULL AND last_check_time IS NULL;
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
