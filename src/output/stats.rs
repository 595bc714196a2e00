//! Engine counters and statistics reporting
//!
//! The coordinator bumps `EngineCounters` as requests move through the
//! engine; `CrawlStatistics` is a point-in-time copy of those counters.

use crate::state::PageMetadata;
use crate::storage::{Storage, StorageResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the poll loop and batch tasks
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub batches_polled: AtomicU64,
    pub batches_committed: AtomicU64,
    pub requests_polled: AtomicU64,
    /// Requests admitted with `Decision::Crawl`
    pub crawled: AtomicU64,
    pub stored: AtomicU64,
    pub duplicates: AtomicU64,
    pub retries_scheduled: AtomicU64,
    pub rejected: AtomicU64,
    /// Requests re-enqueued because their scheduled time had not come
    pub deferred: AtomicU64,
    pub failed: AtomicU64,
    pub links_enqueued: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` to a counter
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn snapshot(&self) -> CrawlStatistics {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CrawlStatistics {
            batches_polled: load(&self.batches_polled),
            batches_committed: load(&self.batches_committed),
            requests_polled: load(&self.requests_polled),
            crawled: load(&self.crawled),
            stored: load(&self.stored),
            duplicates: load(&self.duplicates),
            retries_scheduled: load(&self.retries_scheduled),
            rejected: load(&self.rejected),
            deferred: load(&self.deferred),
            failed: load(&self.failed),
            links_enqueued: load(&self.links_enqueued),
        }
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStatistics {
    pub batches_polled: u64,
    pub batches_committed: u64,
    pub requests_polled: u64,
    pub crawled: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub retries_scheduled: u64,
    pub rejected: u64,
    pub deferred: u64,
    pub failed: u64,
    pub links_enqueued: u64,
}

impl CrawlStatistics {
    /// Share of admitted requests that ended up stored, in percent
    pub fn store_rate(&self) -> f64 {
        if self.crawled == 0 {
            0.0
        } else {
            (self.stored as f64 / self.crawled as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Batches:");
    println!("  Polled: {}", stats.batches_polled);
    println!("  Committed: {}", stats.batches_committed);
    println!();

    println!("Requests:");
    println!("  Polled: {}", stats.requests_polled);
    println!("  Crawled: {}", stats.crawled);
    println!("  Rejected: {}", stats.rejected);
    println!("  Retries scheduled: {}", stats.retries_scheduled);
    println!("  Deferred (not ready): {}", stats.deferred);
    println!();

    println!("Pages:");
    println!("  Stored: {}", stats.stored);
    println!("  Duplicates: {}", stats.duplicates);
    println!("  Failed: {}", stats.failed);
    println!("  Links enqueued: {}", stats.links_enqueued);
    println!();

    println!(
        "Store Rate: {:.1}% ({} / {} crawled requests stored)",
        stats.store_rate(),
        stats.stored,
        stats.crawled
    );
}

/// Prints the stored page count and the most recently fetched pages
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `recent` - How many recent pages to list
pub async fn print_storage_summary(storage: &dyn Storage, recent: usize) -> StorageResult<()> {
    let total = storage.page_count().await?;
    let pages = storage.list_pages(recent, 0).await?;

    println!("=== Stored Pages ===\n");
    println!("Total pages: {}", total);
    println!();

    if !pages.is_empty() {
        println!("Most recent ({}):", pages.len());
        for page in &pages {
            println!("  {}", format_page_line(page));
        }
    }

    Ok(())
}

fn format_page_line(page: &PageMetadata) -> String {
    let depth = page
        .metadata
        .get("depth")
        .map(String::as_str)
        .unwrap_or("?");
    format!(
        "[{}] {} (depth {}, {} links, {})",
        page.http_status,
        page.url,
        depth,
        page.links.len(),
        page.fetch_time.format("%Y-%m-%d %H:%M:%S")
    )
}
