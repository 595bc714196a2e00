//! Stub collaborators shared by the crawler unit tests

use crate::crawler::{FetchedPage, Fetcher};
use crate::queue::{FrontierProducer, MemoryFrontier, QueueError, QueueResult};
use crate::state::{CrawlRequest, PageContent, PageMetadata};
use crate::storage::{SqliteStorage, Storage, StorageResult};
use crate::FetchError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum StubResponse {
    Page { body: Vec<u8>, content_type: String },
    Status(u16),
    Panic,
}

/// Fetcher serving canned responses; unknown URLs answer 404
#[derive(Debug, Default)]
pub(crate) struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: &str, html: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            StubResponse::Page {
                body: html.as_bytes().to_vec(),
                content_type: "text/html; charset=utf-8".to_string(),
            },
        );
        self
    }

    pub(crate) fn with_body(mut self, url: &str, body: &[u8], content_type: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            StubResponse::Page {
                body: body.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        self
    }

    pub(crate) fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Status(status));
        self
    }

    /// Fetching this URL panics inside the task that processes it
    pub(crate) fn with_panic(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), StubResponse::Panic);
        self
    }

    /// Every fetch sleeps this long before answering
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|called| *called == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.responses.get(url).cloned() {
            Some(StubResponse::Page { body, content_type }) => {
                let mut headers = BTreeMap::new();
                headers.insert("content-type".to_string(), content_type);
                Ok(FetchedPage {
                    final_url: url.to_string(),
                    status: 200,
                    headers,
                    body,
                })
            }
            Some(StubResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(StubResponse::Panic) => panic!("stub fetcher asked to panic on {}", url),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Producer that refuses selected URLs and forwards the rest
pub(crate) struct SelectiveProducer {
    pub(crate) inner: MemoryFrontier,
    refused: HashSet<String>,
}

impl SelectiveProducer {
    pub(crate) fn refusing(inner: MemoryFrontier, refused: &[&str]) -> Self {
        Self {
            inner,
            refused: refused.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[async_trait]
impl FrontierProducer for SelectiveProducer {
    async fn enqueue(&self, request: CrawlRequest) -> QueueResult<()> {
        if self.refused.contains(&request.url) {
            return Err(QueueError::Closed);
        }
        self.inner.enqueue(request).await
    }
}

/// SQLite storage whose `exists` answers only after a delay, like a remote store
pub(crate) struct SlowStorage {
    pub(crate) inner: Arc<SqliteStorage>,
    exists_delay: Duration,
}

impl SlowStorage {
    pub(crate) fn new(inner: Arc<SqliteStorage>, exists_delay: Duration) -> Self {
        Self {
            inner,
            exists_delay,
        }
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn store(&self, page: &PageContent) -> StorageResult<()> {
        self.inner.store(page).await
    }

    async fn exists(&self, content_hash: &str) -> StorageResult<bool> {
        let found = self.inner.exists(content_hash).await?;
        tokio::time::sleep(self.exists_delay).await;
        Ok(found)
    }

    async fn retrieve(&self, url: &str) -> StorageResult<Option<PageContent>> {
        self.inner.retrieve(url).await
    }

    async fn list_pages(&self, limit: usize, offset: usize) -> StorageResult<Vec<PageMetadata>> {
        self.inner.list_pages(limit, offset).await
    }

    async fn search_pages(&self, term: &str, limit: usize) -> StorageResult<Vec<PageMetadata>> {
        self.inner.search_pages(term, limit).await
    }

    async fn page_count(&self) -> StorageResult<u64> {
        self.inner.page_count().await
    }
}
