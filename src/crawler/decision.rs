//! Admission decisions
//!
//! `decide` runs a fixed sequence of checks against a dequeued request and
//! stops at the first one that fails:
//!
//! 1. depth limit
//! 2. retry budget
//! 3. allowed domains (full match on the host)
//! 4. exclude patterns (full match on the URL)
//! 5. politeness delay for the host
//! 6. robots.txt, when enabled
//!
//! Evaluation errors such as an unparseable URL become `Decision::Reject`.

use crate::config::CrawlerConfig;
use crate::robots::RobotsCache;
use crate::state::{CrawlRequest, PolitenessTracker};
use crate::url::{parse_with_host, DomainFilter};
use crate::UrlResult;
use chrono::{DateTime, Duration, Utc};

/// Outcome of an admission check
///
/// Only `RetryLater` carries a retry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Fetch the page now
    Crawl,

    /// Try again once `retry_at` has passed
    RetryLater {
        reason: String,
        retry_at: DateTime<Utc>,
    },

    /// Never crawl this request
    Reject { reason: String },
}

impl Decision {
    fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    /// Diagnostic text for logs
    pub fn reason(&self) -> &str {
        match self {
            Self::Crawl => "all checks passed",
            Self::RetryLater { reason, .. } | Self::Reject { reason } => reason.as_str(),
        }
    }

    pub fn is_crawl(&self) -> bool {
        matches!(self, Self::Crawl)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject { .. })
    }
}

/// Limits applied during admission, taken from the crawler configuration
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub max_depth: u32,
    pub max_retry_attempts: u32,
    pub crawl_delay: Duration,
    pub enable_delay_retry: bool,
    pub respect_robots_txt: bool,
}

impl AdmissionPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_retry_attempts: config.max_retry_attempts,
            crawl_delay: config.crawl_delay(),
            enable_delay_retry: config.enable_delay_retry,
            respect_robots_txt: config.respect_robots_txt,
        }
    }
}

/// Everything `decide` reads besides the request itself
#[derive(Clone, Copy)]
pub struct AdmissionContext<'a> {
    pub policy: &'a AdmissionPolicy,
    pub filter: &'a DomainFilter,
    pub politeness: &'a PolitenessTracker,
    pub robots: &'a RobotsCache,
}

/// Decides whether a request may be crawled at `now`
///
/// The only side effect is populating the robots cache on a miss.
///
/// # Arguments
///
/// * `request` - The dequeued request
/// * `ctx` - Policy, filters and shared per-host state
/// * `now` - The instant the decision is made for
///
/// # Returns
///
/// `Decision::Crawl`, `Decision::RetryLater` with the time the host becomes
/// ready, or `Decision::Reject` with a reason
pub async fn decide(
    request: &CrawlRequest,
    ctx: &AdmissionContext<'_>,
    now: DateTime<Utc>,
) -> Decision {
    match evaluate(request, ctx, now).await {
        Ok(decision) => decision,
        Err(e) => Decision::reject(e.to_string()),
    }
}

async fn evaluate(
    request: &CrawlRequest,
    ctx: &AdmissionContext<'_>,
    now: DateTime<Utc>,
) -> UrlResult<Decision> {
    let policy = ctx.policy;

    if request.depth > policy.max_depth {
        return Ok(Decision::reject(format!(
            "depth {} exceeds max depth {}",
            request.depth, policy.max_depth
        )));
    }

    if request.retry_count > policy.max_retry_attempts {
        return Ok(Decision::reject(format!(
            "exceeded max retry attempts ({})",
            policy.max_retry_attempts
        )));
    }

    let (_, host) = parse_with_host(&request.url)?;

    if !ctx.filter.host_allowed(&host) {
        return Ok(Decision::reject(format!(
            "domain {} is not in the allowed domains",
            host
        )));
    }

    if ctx.filter.url_excluded(&request.url) {
        return Ok(Decision::reject("URL matches an exclude pattern"));
    }

    if let Some(retry_at) = ctx.politeness.ready_at(&host, policy.crawl_delay, now) {
        let reason = format!("crawl delay not satisfied for {}", host);
        return Ok(if policy.enable_delay_retry {
            Decision::RetryLater { reason, retry_at }
        } else {
            Decision::reject(reason)
        });
    }

    if policy.respect_robots_txt {
        let rules = ctx.robots.rules_for(&request.url).await?;
        if let Some(rule) = rules.blocking_rule(&request.url) {
            return Ok(Decision::reject(format!(
                "robots.txt disallows {} (rule {})",
                request.url, rule
            )));
        }
    }

    Ok(Decision::Crawl)
}
