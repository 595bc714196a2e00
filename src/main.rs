//! Ripple-Crawl main entry point
//!
//! This is the command-line interface for the Ripple-Crawl engine.

use anyhow::Context;
use clap::Parser;
use ripple_crawl::config::{load_config_with_hash, Config};
use ripple_crawl::crawler::{Coordinator, HttpFetcher};
use ripple_crawl::output::{print_statistics, print_storage_summary};
use ripple_crawl::queue::SqliteFrontier;
use ripple_crawl::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Number of recent pages listed by --stats
const RECENT_PAGES: usize = 20;

/// Ripple-Crawl: a polite, batch-oriented web crawler
///
/// Ripple-Crawl pulls URLs from a durable frontier, admits them against depth,
/// domain, politeness and robots.txt rules, stores deduplicated page content
/// and feeds discovered links back into the frontier.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A polite, batch-oriented web crawler", long_about = None)]
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

    /// Additional seed URL (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show stored page statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    config.crawler.seed_urls.extend(cli.seeds);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_crawl(config).await?;
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
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;
    let timeouts = &config.timeouts;

    println!("=== Ripple-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", crawler.max_depth);
    println!(
        "  Max concurrent requests: {} ({} batch workers)",
        crawler.max_concurrent_requests,
        crawler.worker_count()
    );
    println!("  Crawl delay: {}ms", crawler.crawl_delay_ms);
    println!(
        "  Delay retries: {} (max {} attempts)",
        if crawler.enable_delay_retry { "on" } else { "off" },
        crawler.max_retry_attempts
    );
    println!("  Respect robots.txt: {}", crawler.respect_robots_txt);
    println!("  User agent: {}", crawler.user_agent);

    println!("\nTimeouts:");
    println!("  Poll: {}ms", timeouts.poll_timeout_ms);
    println!("  Fetch: {}ms", timeouts.fetch_timeout_ms);
    println!("  Robots: {}ms", timeouts.robots_timeout_ms);
    println!("  Error backoff: {}ms", timeouts.error_backoff_ms);

    println!("\nQueue:");
    println!("  Batch size: {}", config.queue.batch_size);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nAllowed Domains ({}):", crawler.allowed_domains.len());
    for pattern in &crawler.allowed_domains {
        println!("  - {}", pattern);
    }

    println!("\nExclude Patterns ({}):", crawler.exclude_patterns.len());
    for pattern in &crawler.exclude_patterns {
        println!("  - {}", pattern);
    }

    println!("\nSeed URLs ({}):", crawler.seed_urls.len());
    for seed in &crawler.seed_urls {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows what the database holds
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.output.database_path);
    println!("Database: {}\n", path.display());

    let storage = SqliteStorage::new(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let frontier = SqliteFrontier::open(path, config.queue.batch_size)?;

    print_storage_summary(&storage, RECENT_PAGES).await?;
    println!(
        "\nFrontier: {} pending, {} leased",
        frontier.pending_count().await?,
        frontier.leased_count().await?
    );

    Ok(())
}

/// Handles the main crawl operation: runs until Ctrl-C
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let path = PathBuf::from(&config.output.database_path);

    let fetcher = HttpFetcher::new(&config.crawler.user_agent)?;
    let storage = SqliteStorage::new(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let frontier = SqliteFrontier::open(&path, config.queue.batch_size)?;

    tracing::info!(
        "Seed URLs: {}, allowed domain patterns: {}, exclude patterns: {}",
        config.crawler.seed_urls.len(),
        config.crawler.allowed_domains.len(),
        config.crawler.exclude_patterns.len()
    );

    let mut coordinator = Coordinator::new(
        config,
        Arc::new(fetcher),
        Arc::new(storage),
        Arc::new(frontier.clone()),
        Box::new(frontier),
    )?;

    coordinator.start().await?;
    tracing::info!("Crawling; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    coordinator.stop().await?;
    print_statistics(&coordinator.statistics());

    Ok(())
}
