//! Robots.txt caching implementation
//!
//! Rules are fetched once per host and kept for the lifetime of the cache.
//! Fetch or parse failures are cached as empty rules (fail-open).

use crate::crawler::Fetcher;
use crate::robots::RobotsRules;
use crate::url::parse_with_host;
use crate::UrlResult;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Per-host memo of robots.txt rules
pub struct RobotsCache {
    rules: DashMap<String, Arc<RobotsRules>>,
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used to download robots.txt files
    /// * `timeout` - Timeout for each robots.txt fetch, independent of the page timeout
    pub fn new(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self {
            rules: DashMap::new(),
            fetcher,
            timeout,
        }
    }

    /// Returns the rules for the URL's host, fetching them on first access
    ///
    /// Concurrent misses for the same host may fetch twice; the first result
    /// inserted wins and later ones are discarded.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<RobotsRules>)` - Cached or freshly fetched rules
    /// * `Err(UrlError)` - The URL could not be parsed or has no host
    pub async fn rules_for(&self, url: &str) -> UrlResult<Arc<RobotsRules>> {
        let (parsed, host) = parse_with_host(url)?;

        if let Some(rules) = self.rules.get(&host) {
            return Ok(Arc::clone(rules.value()));
        }

        let fetched = Arc::new(self.fetch_rules(&parsed, &host).await);
        let entry = self.rules.entry(host).or_insert(fetched);
        Ok(Arc::clone(entry.value()))
    }

    /// True iff robots.txt for the URL's host does not disallow it
    pub async fn is_allowed(&self, url: &str) -> UrlResult<bool> {
        Ok(self.rules_for(url).await?.is_allowed(url))
    }

    /// Number of hosts with cached rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    async fn fetch_rules(&self, url: &Url, host: &str) -> RobotsRules {
        let robots_url = match robots_url(url) {
            Some(robots_url) => robots_url,
            None => return RobotsRules::allow_all(),
        };

        match self.fetcher.fetch(&robots_url, self.timeout).await {
            Ok(page) => {
                let rules = RobotsRules::parse(&page.text());
                tracing::debug!(
                    "Loaded robots.txt for {} ({} disallow rules)",
                    host,
                    rules.disallowed_paths().len()
                );
                rules
            }
            Err(e) => {
                tracing::debug!("No usable robots.txt for {}, allowing all: {}", host, e);
                RobotsRules::allow_all()
            }
        }
    }
}

/// Builds `{scheme}://{host}[:port]/robots.txt` for a page URL
fn robots_url(url: &Url) -> Option<String> {
    url.join("/robots.txt").ok().map(|u| u.to_string())
}
