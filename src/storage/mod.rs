//! Storage module for persisting crawl data
//!
//! This module handles all database operations for page content, including:
//! - SQLite database initialization and schema management
//! - Content-addressed body storage used for deduplication
//! - Read-side listing, search and counting helpers

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, open_connection, open_in_memory};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};
