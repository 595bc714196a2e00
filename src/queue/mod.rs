//! Frontier queue module
//!
//! The frontier is consumed through a narrow contract split in two halves:
//!
//! - `FrontierProducer`: `enqueue`, shared by seeding, the pipeline and the
//!   retry scheduler
//! - `FrontierConsumer`: `poll_batch` / `commit_batch`, owned by exactly one
//!   poll loop so consumer offsets are never touched concurrently
//!
//! `commit_batch` acknowledges every request polled since the previous commit.
//! Requests polled but never committed are redelivered after a restart.

mod memory;
mod sqlite;

pub use memory::MemoryFrontier;
pub use sqlite::SqliteFrontier;

use crate::state::CrawlRequest;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue is closed")]
    Closed,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Write side of the frontier
#[async_trait]
pub trait FrontierProducer: Send + Sync {
    /// Appends a request to the frontier
    async fn enqueue(&self, request: CrawlRequest) -> QueueResult<()>;
}

/// Read side of the frontier
#[async_trait]
pub trait FrontierConsumer: Send {
    /// Waits up to `timeout` for requests and returns at most one batch
    ///
    /// Returns an empty vector when nothing arrived in time. Requests that are
    /// scheduled for the future may be returned; callers must check readiness.
    async fn poll_batch(&mut self, timeout: Duration) -> QueueResult<Vec<CrawlRequest>>;

    /// Acknowledges all requests polled since the last commit
    async fn commit_batch(&mut self) -> QueueResult<()>;
}
