//! Worker loop - claim, scrape, persist, enqueue, index, release
//!
//! A worker processes one queue row at a time. Scaling out means running more
//! worker processes against the same queue database; the atomic claim is the only
//! point where they coordinate.

use crate::config::Config;
use crate::crawler::{build_http_client, Scraper};
use crate::index::{handoff_operations, IndexClient};
use crate::state::{PriorValidators, ScrapeOutcome, ScrapedPage, EXCEPTION_STATUS};
use crate::storage::{
    ClaimGuard, ClaimStrategy, EnqueueOutcome, QueueStore, ScrapeRecord, ScrapeTarget,
    SqliteStorage, StorageResult,
};
use crate::url::target_url;
use crate::PagewellError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What one cycle of the worker loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// No row was eligible
    Idle,

    /// A row was claimed, processed, and released with this recorded status
    Processed { target_id: i64, status: u16 },
}

/// Totals over one run of the worker loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub processed: u64,

    /// Rows whose recorded status was not 200
    pub failed: u64,
}

/// Main worker structure
pub struct Worker<'s, Q: QueueStore + ?Sized = SqliteStorage> {
    store: &'s Q,
    scraper: Scraper,
    index: IndexClient,
    strategy: ClaimStrategy,
    holder: String,
    scheme: String,
    default_cache_age: u64,
    idle_poll_interval: Duration,
    exit_when_idle: bool,
}

impl<'s, Q: QueueStore + ?Sized> Worker<'s, Q> {
    /// Creates a worker over `store`
    ///
    /// # Arguments
    ///
    /// * `store` - The shared queue
    /// * `config` - The worker, user agent, and index configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Worker)` - Ready to run
    /// * `Err(PagewellError)` - The HTTP or index client could not be built
    pub fn new(store: &'s Q, config: &Config) -> Result<Self, PagewellError> {
        let client = build_http_client(&config.user_agent)?;
        let index = IndexClient::from_config(&config.index)?;

        Ok(Self {
            store,
            scraper: Scraper::new(client, config.worker.default_cache_age),
            index,
            strategy: config.worker.claim_strategy,
            holder: config.worker.holder_id(),
            scheme: config.worker.scheme.clone(),
            default_cache_age: config.worker.default_cache_age,
            idle_poll_interval: Duration::from_millis(config.worker.idle_poll_interval),
            exit_when_idle: config.worker.exit_when_idle,
        })
    }

    /// Overrides the configured claim strategy
    pub fn with_strategy(mut self, strategy: ClaimStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Forces the loop to stop once the queue is empty
    pub fn exit_when_idle(mut self, exit: bool) -> Self {
        self.exit_when_idle = exit;
        self
    }

    /// Runs cycles until `shutdown` is cancelled, or until the queue is empty when
    /// `exit-when-idle` is set
    ///
    /// Cancellation is only observed between cycles; a cycle in progress always
    /// finishes and releases its row.
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerSummary {
        tracing::info!(
            holder = %self.holder,
            strategy = %self.strategy,
            "Starting worker"
        );

        let mut summary = WorkerSummary::default();

        while !shutdown.is_cancelled() {
            match self.run_cycle().await {
                Ok(CycleReport::Processed { status, .. }) => {
                    summary.processed += 1;
                    if status != 200 {
                        summary.failed += 1;
                    }
                }
                Ok(CycleReport::Idle) => {
                    if self.exit_when_idle {
                        tracing::info!("No eligible pages, stopping");
                        break;
                    }
                    tracing::debug!("No eligible pages, waiting");
                    self.pause(&shutdown).await;
                }
                Err(e) => {
                    tracing::error!("Failed to claim a page: {}", e);
                    self.pause(&shutdown).await;
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "Worker stopped"
        );
        summary
    }

    async fn pause(&self, shutdown: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.idle_poll_interval) => {}
            _ = shutdown.cancelled() => {}
        }
    }

    /// Claims one row, processes it, and releases it
    ///
    /// Only claim failures are returned. Anything that goes wrong afterwards is
    /// logged, and processing errors are recorded against the row with status 0.
    pub async fn run_cycle(&self) -> StorageResult<CycleReport> {
        let Some(guard) = ClaimGuard::claim(self.store, self.strategy, &self.holder)? else {
            return Ok(CycleReport::Idle);
        };
        let target = guard.target().clone();

        let status = match self.process(&target).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(target_id = target.id, "Error processing {}: {}", target, e);
                if let Err(e) = self.store.record_check(target.id, EXCEPTION_STATUS, None) {
                    tracing::error!(target_id = target.id, "Failed to record error: {}", e);
                }
                EXCEPTION_STATUS
            }
        };

        if let Err(e) = guard.release() {
            tracing::error!(target_id = target.id, "Failed to release {}: {}", target, e);
        }

        Ok(CycleReport::Processed {
            target_id: target.id,
            status,
        })
    }

    async fn process(&self, target: &ScrapeTarget) -> Result<u16, PagewellError> {
        let url = target_url(&self.scheme, &target.url_prefix, &target.path)?;
        let prior = PriorValidators {
            etag: target.etag.clone(),
            last_modified: target.last_modified,
        };

        tracing::info!(target_id = target.id, url = %url, "Scraping page");
        let outcome = self.scraper.scrape(&url, &prior).await;
        let status = outcome.status_code();
        if outcome.is_transport_failure() {
            tracing::warn!(target_id = target.id, url = %url, "Host unreachable");
        }

        match outcome {
            ScrapeOutcome::Success(page) => {
                self.store.record_scrape(
                    target.id,
                    &ScrapeRecord {
                        etag: page.etag.clone(),
                        last_modified: page.last_modified,
                        status: page.status,
                        no_scrape_before: page.next_scrape_after,
                    },
                )?;
                self.enqueue_links(&page.hrefs);
                self.publish(&url, &page).await?;
            }
            ScrapeOutcome::Unchanged | ScrapeOutcome::NotIndexable => {
                self.store
                    .record_check(target.id, status, Some(self.cache_floor()))?;
            }
            ScrapeOutcome::Failed { status } => {
                self.store.record_check(target.id, status, None)?;
            }
        }

        tracing::info!(target_id = target.id, url = %url, status, "Finished page");
        Ok(status)
    }

    fn cache_floor(&self) -> DateTime<Utc> {
        let now = Utc::now();
        i64::try_from(self.default_cache_age)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|age| now.checked_add_signed(age))
            .unwrap_or(now)
    }

    /// Queues discovered links; a failure on one link does not stop the rest
    fn enqueue_links(&self, hrefs: &[Url]) {
        let mut inserted = 0;
        for href in hrefs {
            match self.store.enqueue(href) {
                Ok(EnqueueOutcome::Inserted { .. }) => inserted += 1,
                Ok(EnqueueOutcome::AlreadyQueued) => {}
                Ok(EnqueueOutcome::NoMatchingBase) => {
                    tracing::trace!(href = %href, "Link outside known url bases");
                }
                Err(e) => tracing::warn!(href = %href, "Failed to queue link: {}", e),
            }
        }
        tracing::debug!(found = hrefs.len(), inserted, "Queued discovered links");
    }

    async fn publish(&self, url: &Url, page: &ScrapedPage) -> Result<(), PagewellError> {
        let operations = handoff_operations(url, page, Utc::now());
        let summary = self.index.bulk(&operations).await?;

        if summary.has_failures() {
            tracing::error!(
                canonical = %page.canonical,
                failures = summary.failures.len(),
                "Index rejected part of the bulk request"
            );
        } else {
            tracing::info!(canonical = %page.canonical, "Indexed page content");
        }
        Ok(())
    }
}
