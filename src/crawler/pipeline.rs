//! Fetch-and-discover pipeline
//!
//! Runs for every request admitted with `Decision::Crawl`. Steps are strictly
//! sequential and not transactional: a failure stops the remaining steps but
//! nothing already done is rolled back.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::extract_links;
use crate::queue::FrontierProducer;
use crate::state::{content_hash, CrawlRequest, PageContent, PolitenessTracker};
use crate::storage::Storage;
use crate::url::{parse_with_host, DomainFilter};
use crate::Result;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What happened to a request that went through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The page was stored and its admissible links enqueued
    Stored {
        content_hash: String,
        links_found: usize,
        links_enqueued: usize,
    },

    /// The body was already stored, or is being stored, under some URL;
    /// nothing else was done
    Duplicate { content_hash: String },

    /// Another fetch to the same host started within the crawl delay; nothing
    /// was fetched and the host is free again at `retry_at`
    Deferred { retry_at: DateTime<Utc> },
}

/// Marks a content hash as being stored by one request until dropped
struct HashClaim<'a> {
    claims: &'a DashSet<String>,
    hash: String,
}

impl<'a> HashClaim<'a> {
    fn acquire(claims: &'a DashSet<String>, hash: &str) -> Option<Self> {
        if claims.insert(hash.to_string()) {
            Some(Self {
                claims,
                hash: hash.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for HashClaim<'_> {
    fn drop(&mut self) {
        self.claims.remove(&self.hash);
    }
}

/// Shared handles the pipeline works with
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Storage>,
    producer: Arc<dyn FrontierProducer>,
    politeness: Arc<PolitenessTracker>,
    crawl_delay: chrono::Duration,
    filter: Arc<DomainFilter>,
    fetch_timeout: Duration,
    // Hashes between the `exists` check and the finished `store`
    in_flight: Arc<DashSet<String>>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
        producer: Arc<dyn FrontierProducer>,
        politeness: Arc<PolitenessTracker>,
        crawl_delay: chrono::Duration,
        filter: Arc<DomainFilter>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            storage,
            producer,
            politeness,
            crawl_delay,
            filter,
            fetch_timeout,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Fetches, deduplicates, stores and expands one request
    ///
    /// # Steps
    ///
    /// 1. Record the fetch start for the host, or stop with `Deferred` when
    ///    another fetch to it started within the crawl delay
    /// 2. Fetch the page
    /// 3. Hash the raw body
    /// 4. Stop with `Duplicate` if the hash is already stored or another
    ///    request is storing it right now
    /// 5. Extract absolute links (HTML responses only)
    /// 6. Keep links admitted by the domain filter
    /// 7. Store the page with its depth in the metadata
    /// 8. Enqueue each kept link at `depth + 1`
    ///
    /// A failed enqueue is logged and the remaining links are still enqueued.
    ///
    /// # Returns
    ///
    /// * `Ok(PipelineOutcome)` - The page was stored, recognised as a duplicate,
    ///   or deferred for politeness
    /// * `Err(CrawlError)` - Parsing the URL, fetching, or storage failed
    pub async fn process(&self, request: &CrawlRequest) -> Result<PipelineOutcome> {
        let (base_url, host) = parse_with_host(&request.url)?;
        if let Err(retry_at) = self
            .politeness
            .try_begin_visit(&host, self.crawl_delay, Utc::now())
        {
            tracing::debug!("{} busy until {}, deferring {}", host, retry_at, request.url);
            return Ok(PipelineOutcome::Deferred { retry_at });
        }

        let page = self.fetcher.fetch(&request.url, self.fetch_timeout).await?;

        let hash = content_hash(&page.body);
        let Some(claim) = HashClaim::acquire(&self.in_flight, &hash) else {
            tracing::debug!("Same content is being stored already: {}", request.url);
            return Ok(PipelineOutcome::Duplicate { content_hash: hash });
        };
        if self.storage.exists(&hash).await? {
            tracing::debug!("Skipping duplicate content: {}", request.url);
            return Ok(PipelineOutcome::Duplicate { content_hash: hash });
        }

        let links = if page.is_html() {
            let base = Url::parse(&page.final_url).unwrap_or(base_url);
            extract_links(&page.text(), &base)
        } else {
            BTreeSet::new()
        };

        let admitted: Vec<&String> = links
            .iter()
            .filter(|link| self.filter.admits(link))
            .collect();

        let mut metadata = BTreeMap::new();
        metadata.insert("depth".to_string(), request.depth.to_string());

        let content = PageContent {
            url: request.url.clone(),
            content_hash: hash.clone(),
            fetch_time: Utc::now(),
            http_status: page.status,
            headers: page.headers,
            links: links.clone(),
            metadata,
            content: page.body,
        };
        self.storage.store(&content).await?;
        drop(claim);

        let mut links_enqueued = 0;
        for link in &admitted {
            let discovered = CrawlRequest::discovered(link.as_str(), request);
            match self.producer.enqueue(discovered).await {
                Ok(()) => links_enqueued += 1,
                Err(e) => tracing::warn!("Failed to enqueue {} from {}: {}", link, request.url, e),
            }
        }

        tracing::debug!(
            "Stored {} ({} links, {} enqueued)",
            request.url,
            links.len(),
            links_enqueued
        );

        Ok(PipelineOutcome::Stored {
            content_hash: hash,
            links_found: links.len(),
            links_enqueued,
        })
    }
}
