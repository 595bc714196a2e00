//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests for pages and robots.txt with per-call timeouts
//! - Error classification into timeout, status and transport failures

use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Response headers; repeated headers are joined with ", "
    pub headers: BTreeMap<String, String>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Returns the Content-Type header, if present
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// True when the response is HTML, or when no Content-Type was sent
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true)
    }

    /// The body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Capability to fetch a URL and return status, headers and body
///
/// Non-2xx responses are reported as `FetchError::Status`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent string sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::crawler::build_http_client;
///
/// let client = build_http_client("DistributedCrawler/1.0").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(FetchError::Client)
}

/// reqwest-backed fetcher used in production
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose client sends the given user agent
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            headers,
            body: body.to_vec(),
        })
    }
}

/// Maps a send error to the matching `FetchError` variant
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}
