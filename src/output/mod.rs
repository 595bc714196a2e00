//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Live engine counters and their snapshots
//! - Console reporting of statistics and stored pages

pub mod stats;

pub use stats::{print_statistics, print_storage_summary, CrawlStatistics, EngineCounters};
