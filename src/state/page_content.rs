use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Hex-encoded SHA-256 of raw bytes
///
/// Pages are deduplicated by this value rather than by URL.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A fetched page with its raw body and metadata
///
/// Created once per successful, non-duplicate fetch and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub url: String,
    pub content_hash: String,
    /// Raw response body, persisted apart from the metadata
    pub content: Vec<u8>,
    pub fetch_time: DateTime<Utc>,
    pub http_status: u16,
    pub headers: BTreeMap<String, String>,
    /// Absolute URLs extracted from the page
    pub links: BTreeSet<String>,
    /// Free-form annotations; carries the crawl depth
    pub metadata: BTreeMap<String, String>,
}

/// Page metadata without the body, returned by listing queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    pub content_hash: String,
    pub fetch_time: DateTime<Utc>,
    pub http_status: u16,
    pub headers: BTreeMap<String, String>,
    pub links: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PageContent {
    /// Crawl depth recorded in the metadata, if any
    pub fn depth(&self) -> Option<u32> {
        self.metadata.get("depth").and_then(|d| d.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let body = b"<html><body>hello</body></html>";
        assert_eq!(content_hash(body), content_hash(body));
        assert_eq!(content_hash(body).len(), 64);
    }

    #[test]
    fn test_hash_known_value() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_differs_for_different_bytes() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[test]
    fn test_depth_from_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("depth".to_string(), "2".to_string());
        let page = PageContent {
            url: "https://a.test/".to_string(),
            content_hash: content_hash(b"x"),
            content: b"x".to_vec(),
            fetch_time: Utc::now(),
            http_status: 200,
            headers: BTreeMap::new(),
            links: BTreeSet::new(),
            metadata,
        };
        assert_eq!(page.depth(), Some(2));
    }
}
