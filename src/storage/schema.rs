//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Ripple-Crawl
//! database. Page storage and the durable frontier share one file, each
//! opening its own connection.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Raw page bodies, one row per distinct content hash
CREATE TABLE IF NOT EXISTS page_bodies (
    content_hash TEXT PRIMARY KEY,
    body BLOB NOT NULL
);

-- Page metadata, one row per URL
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    fetch_time TEXT NOT NULL,
    http_status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    links TEXT NOT NULL,
    metadata TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);
CREATE INDEX IF NOT EXISTS idx_pages_fetch_time ON pages(fetch_time);

-- Durable crawl frontier
CREATE TABLE IF NOT EXISTS frontier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    payload TEXT NOT NULL,
    leased INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_frontier_leased ON frontier(leased, id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Opens a database file with the crawler's PRAGMAs and schema applied
pub fn open_connection(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;
    // Storage and frontier write to the same file from separate connections
    conn.busy_timeout(Duration::from_secs(5))?;

    initialize_schema(&conn)?;
    Ok(conn)
}

/// Opens an in-memory database with the schema applied
pub fn open_in_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}
