//! Pagewell: a cooperative page scraper for a bounded set of crawl domains
//!
//! Worker processes share one SQLite queue of scrape targets. Each worker claims a
//! target, decides with a HEAD/GET conditional fetch whether the page changed,
//! extracts its indexable content, queues newly discovered links, and hands the
//! document to a search index.

pub mod config;
pub mod crawler;
pub mod index;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pagewell operations
#[derive(Debug, Error)]
pub enum PagewellError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("Unsupported URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for Pagewell operations
pub type Result<T> = std::result::Result<T, PagewellError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Scraper, Worker};
pub use state::{PriorValidators, ScrapeOutcome, ScrapedPage};
pub use storage::{ClaimStrategy, SqliteStorage, QueueStore};
