//! Pagewell main entry point
//!
//! This is the command-line interface for the Pagewell page scraper.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use pagewell::config::{load_config_with_hash, Config};
use pagewell::storage::{open_storage, ClaimStrategy, EnqueueOutcome, QueueStore, SqliteStorage};
use pagewell::Worker;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Pagewell: a cooperative page scraper
///
/// Claims pages from a shared SQLite queue, re-scrapes them only when their
/// caching validators show a change, queues the links they contain, and sends
/// their content to a search index. Run as many workers as needed against one
/// queue file.
#[derive(Parser, Debug)]
#[command(name = "pagewell")]
#[command(version)]
#[command(about = "A cooperative page scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured claim strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Url base to claim from (implies --strategy within-base)
    #[arg(long, value_name = "ID")]
    base_id: Option<i64>,

    /// Process at most one page and exit
    #[arg(long)]
    once: bool,

    /// Register a url base prefix (host plus optional path, no scheme) and exit
    #[arg(long, value_name = "PREFIX", conflicts_with_all = ["stats", "once"])]
    add_base: Vec<String>,

    /// Queue a URL under its url base and exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["stats", "once"])]
    seed: Vec<String>,

    /// Show queue statistics and exit
    #[arg(long)]
    stats: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Random,
    RandomByBase,
    WithinBase,
}

impl Cli {
    fn claim_strategy(&self) -> anyhow::Result<Option<ClaimStrategy>> {
        Ok(match (self.strategy, self.base_id) {
            (None, None) => None,
            (Some(StrategyArg::Random), None) => Some(ClaimStrategy::Random),
            (Some(StrategyArg::RandomByBase), None) => Some(ClaimStrategy::RandomByBase),
            (Some(StrategyArg::WithinBase) | None, Some(id)) => Some(ClaimStrategy::WithinBase(id)),
            (Some(StrategyArg::WithinBase), None) => {
                bail!("--strategy within-base requires --base-id")
            }
            (Some(other), Some(_)) => bail!("--base-id cannot be combined with --strategy {:?}", other),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let strategy = cli.claim_strategy()?;

    let storage = open_storage(Path::new(&config.database.path))
        .with_context(|| format!("failed to open queue database {}", config.database.path))?;

    // Handle different modes
    if !cli.add_base.is_empty() || !cli.seed.is_empty() {
        handle_add_bases(&storage, &cli.add_base)?;
        handle_seeds(&storage, &cli.seed)?;
    } else if cli.stats {
        handle_stats(&storage, &config)?;
    } else {
        handle_worker(&storage, &config, strategy, cli.once).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagewell=info,warn"),
            1 => EnvFilter::new("pagewell=debug,info"),
            2 => EnvFilter::new("pagewell=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --add-base: registers each prefix
fn handle_add_bases(storage: &SqliteStorage, prefixes: &[String]) -> anyhow::Result<()> {
    for prefix in prefixes {
        let id = storage
            .add_url_base(prefix)
            .with_context(|| format!("failed to register url base {:?}", prefix))?;
        println!("url base {}: {}", id, prefix.trim());
    }
    Ok(())
}

/// Handles --seed: queues each URL under its longest matching url base
fn handle_seeds(storage: &SqliteStorage, seeds: &[String]) -> anyhow::Result<()> {
    for seed in seeds {
        let url = Url::parse(seed).with_context(|| format!("invalid seed URL {:?}", seed))?;
        match storage.enqueue(&url)? {
            EnqueueOutcome::Inserted { id, url_base_id } => {
                println!("queued {} as #{} (url base {})", url, id, url_base_id)
            }
            EnqueueOutcome::AlreadyQueued => println!("already queued: {}", url),
            EnqueueOutcome::NoMatchingBase => {
                println!("skipped {}: no url base matches", url)
            }
        }
    }
    Ok(())
}

/// Handles the --stats mode: shows statistics from the queue
fn handle_stats(storage: &SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let stats = storage.queue_stats()?;
    let bases = storage.list_url_bases()?;

    println!("=== Pagewell Queue ===\n");
    println!("Database: {}", config.database.path);
    println!("Url bases: {}", bases.len());
    for base in &bases {
        println!("  {:>4}  {}", base.id, base.url_prefix);
    }

    println!("\nPages:");
    println!("  Total:   {}", stats.total);
    println!("  Checked: {}", stats.checked);
    println!("  Pending: {}", stats.pending);
    println!("  Locked:  {}", stats.locked);

    if !stats.by_status.is_empty() {
        println!("\nLast status:");
        for (status, count) in &stats.by_status {
            println!("  {:>4}  {}", status, count);
        }
    }

    Ok(())
}

/// Handles the default mode: runs the worker loop until signalled
async fn handle_worker(
    storage: &SqliteStorage,
    config: &Config,
    strategy: Option<ClaimStrategy>,
    once: bool,
) -> anyhow::Result<()> {
    let mut worker = Worker::new(storage, config).context("failed to start worker")?;
    if let Some(strategy) = strategy {
        worker = worker.with_strategy(strategy);
    }

    if once {
        let report = worker.run_cycle().await?;
        tracing::info!("Single cycle finished: {:?}", report);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let summary = worker.run(shutdown).await;
    tracing::info!(
        "Processed {} pages ({} not successful)",
        summary.processed,
        summary.failed
    );
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown requested, finishing current page");
    shutdown.cancel();
}
