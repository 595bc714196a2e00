use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of crawl work held in the frontier
///
/// Requests are created for seeds (depth 0), for links discovered on a page
/// (parent depth + 1) and when a politeness retry is scheduled (same identity,
/// `retry_count` incremented, new `scheduled_for`). `retry_count` never
/// decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    /// Absolute URL to fetch
    pub url: String,

    /// Distance from the seed this request descends from
    pub depth: u32,

    /// Page on which this URL was discovered
    pub parent_url: Option<String>,

    /// When the URL entered the frontier
    pub discovered_at: DateTime<Utc>,

    /// Carried for compatibility; ordering is FIFO
    pub priority: i32,

    /// Number of times this request was recycled through a delayed retry
    #[serde(default)]
    pub retry_count: u32,

    /// Earliest time the request may be processed; `None` means immediately
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl CrawlRequest {
    /// Creates a depth-0 request for a seed URL
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            parent_url: None,
            discovered_at: Utc::now(),
            priority: 1,
            retry_count: 0,
            scheduled_for: None,
        }
    }

    /// Creates a request for a link found on `parent`'s page
    pub fn discovered(url: impl Into<String>, parent: &CrawlRequest) -> Self {
        Self {
            url: url.into(),
            depth: parent.depth + 1,
            parent_url: Some(parent.url.clone()),
            discovered_at: Utc::now(),
            priority: parent.priority,
            retry_count: 0,
            scheduled_for: None,
        }
    }

    /// Returns a copy scheduled for `retry_at` with one more retry consumed
    pub fn with_retry(&self, retry_at: DateTime<Utc>) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            scheduled_for: Some(retry_at),
            ..self.clone()
        }
    }

    /// A request is ready when it is unscheduled or its time has come
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |at| at <= now)
    }
}
