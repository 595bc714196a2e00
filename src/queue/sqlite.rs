//! Durable frontier stored in the crawl database
//!
//! Polled rows are marked as leased and only deleted on commit. Opening the
//! database releases every lease left behind by a previous process, so an
//! uncommitted batch is delivered again after a crash.

use crate::queue::{FrontierConsumer, FrontierProducer, QueueResult};
use crate::state::CrawlRequest;
use crate::storage::{open_connection, open_in_memory};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// SQLite-backed frontier
///
/// Clones share one connection. Notifications only reach pollers in the same
/// process; other writers are picked up when the poll deadline passes.
#[derive(Clone)]
pub struct SqliteFrontier {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    notify: Notify,
    batch_size: usize,
}

impl SqliteFrontier {
    /// Opens the frontier in the given database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `batch_size` - Maximum number of requests returned by one poll
    pub fn open(path: &Path, batch_size: usize) -> QueueResult<Self> {
        let conn = open_connection(path)?;
        let released = conn.execute("UPDATE frontier SET leased = 0 WHERE leased = 1", [])?;
        if released > 0 {
            tracing::info!("Redelivering {} uncommitted frontier entries", released);
        }
        Ok(Self::from_connection(conn, batch_size))
    }

    /// Creates a frontier in a private in-memory database
    pub fn open_in_memory(batch_size: usize) -> QueueResult<Self> {
        Ok(Self::from_connection(open_in_memory()?, batch_size))
    }

    fn from_connection(conn: Connection, batch_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                notify: Notify::new(),
                batch_size: batch_size.max(1),
            }),
        }
    }

    /// Number of entries that have not been polled yet
    pub async fn pending_count(&self) -> QueueResult<u64> {
        let conn = self.inner.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE leased = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Number of entries polled but not yet committed
    pub async fn leased_count(&self) -> QueueResult<u64> {
        let conn = self.inner.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE leased = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Leases up to one batch of rows in insertion order
    async fn lease_batch(&self) -> QueueResult<Vec<CrawlRequest>> {
        let mut conn = self.inner.conn.lock().await;
        let tx = conn.transaction()?;

        let rows: Vec<(i64, String)> = {
            let mut stmt =
                tx.prepare("SELECT id, payload FROM frontier WHERE leased = 0 ORDER BY id LIMIT ?1")?;
            let rows = stmt
                .query_map(params![self.inner.batch_size as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut batch = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match serde_json::from_str::<CrawlRequest>(&payload) {
                Ok(request) => {
                    tx.execute("UPDATE frontier SET leased = 1 WHERE id = ?1", params![id])?;
                    batch.push(request);
                }
                // Deleted here rather than leased: a poll that finds only bad
                // rows returns nothing and is never followed by a commit
                Err(e) => {
                    tracing::warn!("Discarding unreadable frontier entry {}: {}", id, e);
                    tx.execute("DELETE FROM frontier WHERE id = ?1", params![id])?;
                }
            }
        }

        tx.commit()?;
        Ok(batch)
    }
}

#[async_trait]
impl FrontierProducer for SqliteFrontier {
    async fn enqueue(&self, request: CrawlRequest) -> QueueResult<()> {
        let payload = serde_json::to_string(&request)?;
        {
            let conn = self.inner.conn.lock().await;
            conn.execute(
                "INSERT INTO frontier (url, payload, leased, enqueued_at) VALUES (?1, ?2, 0, ?3)",
                params![request.url, payload, Utc::now().to_rfc3339()],
            )?;
        }
        self.inner.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl FrontierConsumer for SqliteFrontier {
    async fn poll_batch(&mut self, timeout: Duration) -> QueueResult<Vec<CrawlRequest>> {
        let deadline = Instant::now() + timeout;
        loop {
            let batch = self.lease_batch().await?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let _ = tokio::time::timeout(deadline - now, self.inner.notify.notified()).await;
        }
    }

    async fn commit_batch(&mut self) -> QueueResult<()> {
        let conn = self.inner.conn.lock().await;
        conn.execute("DELETE FROM frontier WHERE leased = 1", [])?;
        Ok(())
    }
}
