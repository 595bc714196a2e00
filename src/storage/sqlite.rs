//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{PageContent, PageMetadata};
use crate::storage::schema::{open_connection, open_in_memory};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::sync::Mutex;

const METADATA_COLUMNS: &str =
    "url, content_hash, fetch_time, http_status, headers, links, metadata";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_in_memory()?),
        })
    }
}

/// Fixed-width UTC timestamps so that text order matches time order
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("fetch_time '{}': {}", raw, e)))
}

/// Raw columns of a `pages` row, before JSON decoding
struct PageRow {
    url: String,
    content_hash: String,
    fetch_time: String,
    http_status: u16,
    headers: String,
    links: String,
    metadata: String,
}

impl PageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            content_hash: row.get(1)?,
            fetch_time: row.get(2)?,
            http_status: row.get(3)?,
            headers: row.get(4)?,
            links: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    fn into_metadata(self) -> StorageResult<PageMetadata> {
        Ok(PageMetadata {
            fetch_time: parse_time(&self.fetch_time)?,
            headers: serde_json::from_str::<BTreeMap<String, String>>(&self.headers)?,
            links: serde_json::from_str::<BTreeSet<String>>(&self.links)?,
            metadata: serde_json::from_str::<BTreeMap<String, String>>(&self.metadata)?,
            url: self.url,
            content_hash: self.content_hash,
            http_status: self.http_status,
        })
    }
}

fn query_metadata(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StorageResult<Vec<PageMetadata>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, PageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(PageRow::into_metadata).collect()
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn store(&self, page: &PageContent) -> StorageResult<()> {
        let headers = serde_json::to_string(&page.headers)?;
        let links = serde_json::to_string(&page.links)?;
        let metadata = serde_json::to_string(&page.metadata)?;

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO page_bodies (content_hash, body) VALUES (?1, ?2)",
            params![page.content_hash, page.content],
        )?;

        tx.execute(
            "INSERT OR REPLACE INTO pages
             (url, content_hash, fetch_time, http_status, headers, links, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                page.url,
                page.content_hash,
                format_time(&page.fetch_time),
                page.http_status,
                headers,
                links,
                metadata
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn exists(&self, content_hash: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM page_bodies WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn retrieve(&self, url: &str) -> StorageResult<Option<PageContent>> {
        let conn = self.conn.lock().await;

        let row = conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE url = ?1", METADATA_COLUMNS),
                params![url],
                PageRow::from_row,
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let meta = row.into_metadata()?;

        let content: Vec<u8> = conn
            .query_row(
                "SELECT body FROM page_bodies WHERE content_hash = ?1",
                params![meta.content_hash],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("body for {}", url)))?;

        Ok(Some(PageContent {
            url: meta.url,
            content_hash: meta.content_hash,
            content,
            fetch_time: meta.fetch_time,
            http_status: meta.http_status,
            headers: meta.headers,
            links: meta.links,
            metadata: meta.metadata,
        }))
    }

    async fn list_pages(&self, limit: usize, offset: usize) -> StorageResult<Vec<PageMetadata>> {
        let conn = self.conn.lock().await;
        query_metadata(
            &conn,
            &format!(
                "SELECT {} FROM pages ORDER BY fetch_time DESC, url ASC LIMIT ?1 OFFSET ?2",
                METADATA_COLUMNS
            ),
            params![limit as i64, offset as i64],
        )
    }

    async fn search_pages(&self, term: &str, limit: usize) -> StorageResult<Vec<PageMetadata>> {
        let conn = self.conn.lock().await;
        query_metadata(
            &conn,
            &format!(
                "SELECT {} FROM pages WHERE instr(lower(url), lower(?1)) > 0
                 ORDER BY fetch_time DESC, url ASC LIMIT ?2",
                METADATA_COLUMNS
            ),
            params![term, limit as i64],
        )
    }

    async fn page_count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
