use crate::storage::ClaimStrategy;
use serde::Deserialize;

/// Main configuration structure for Pagewell
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub worker: WorkerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub database: DatabaseConfig,
    pub index: IndexConfig,
}

/// Worker loop behavior
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Identifier written into the lock of claimed rows (defaults to `pid:<pid>`)
    #[serde(rename = "holder-id", default)]
    pub holder_id: Option<String>,

    /// How the next queue row is picked
    #[serde(rename = "claim-strategy", default)]
    pub claim_strategy: ClaimStrategy,

    /// Minimum number of seconds before a scraped page may be scraped again
    #[serde(rename = "default-cache-age")]
    pub default_cache_age: u64,

    /// Time to wait before polling again when the queue is empty (milliseconds)
    #[serde(rename = "idle-poll-interval", default = "default_idle_poll_interval")]
    pub idle_poll_interval: u64,

    /// Stop the worker instead of polling when no row is eligible
    #[serde(rename = "exit-when-idle", default)]
    pub exit_when_idle: bool,

    /// Scheme used to turn a url_base prefix and a path into a request URL
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl WorkerConfig {
    /// The lock holder identifier for this process
    pub fn holder_id(&self) -> String {
        self.holder_id
            .clone()
            .unwrap_or_else(|| format!("pid:{}", std::process::id()))
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL; pid:N)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; pid:{})",
            self.crawler_name,
            self.crawler_version,
            self.contact_url,
            std::process::id()
        )
    }
}

/// Queue database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite queue file shared by all workers
    pub path: String,
}

/// Search index service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index service, e.g. `http://localhost:9200`
    pub host: String,

    /// Name of the index documents are written to
    pub index: String,

    /// Ingest pipeline every indexed document is processed through
    pub pipeline: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Name of the environment variable holding the password
    #[serde(rename = "password-env", default)]
    pub password_env: Option<String>,

    /// Deadline for one bulk call (milliseconds)
    #[serde(default = "default_index_timeout")]
    pub timeout: u64,
}

fn default_idle_poll_interval() -> u64 {
    5000
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_index_timeout() -> u64 {
    2000
}
