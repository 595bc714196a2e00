//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{PageContent, PageMetadata};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Content and metadata are stored apart; content is keyed by hash so that
/// byte-identical pages share a single body.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists a page's body and metadata
    ///
    /// Storing the same URL again replaces its metadata.
    async fn store(&self, page: &PageContent) -> StorageResult<()>;

    /// True if a body with this content hash has already been stored
    async fn exists(&self, content_hash: &str) -> StorageResult<bool>;

    /// Loads the page stored for a URL
    async fn retrieve(&self, url: &str) -> StorageResult<Option<PageContent>>;

    // ===== Read-side helpers =====

    /// Lists page metadata, most recently fetched first
    async fn list_pages(&self, limit: usize, offset: usize) -> StorageResult<Vec<PageMetadata>>;

    /// Finds pages whose URL contains `term`, ignoring case
    async fn search_pages(&self, term: &str, limit: usize) -> StorageResult<Vec<PageMetadata>>;

    /// Number of stored pages
    async fn page_count(&self) -> StorageResult<u64>;
}
