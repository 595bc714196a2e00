use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Ripple-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Upper bound on concurrent work, divided among batch workers
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Divisor applied to `max_concurrent_requests` to get the worker count
    #[serde(
        rename = "batch-worker-divisor",
        default = "default_batch_worker_divisor"
    )]
    pub batch_worker_divisor: u32,

    /// Minimum time between fetch starts on the same host (milliseconds)
    #[serde(rename = "crawl-delay-ms", default = "default_crawl_delay_ms")]
    pub crawl_delay_ms: u64,

    /// Number of politeness retries a request may consume before rejection
    #[serde(rename = "max-retry-attempts", default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Reschedule requests blocked by the crawl delay instead of rejecting them
    #[serde(rename = "enable-delay-retry", default = "default_true")]
    pub enable_delay_retry: bool,

    /// Whether robots.txt disallow rules are enforced
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// URLs enqueued at depth 0 when the coordinator starts
    #[serde(rename = "seed-urls", default)]
    pub seed_urls: Vec<String>,

    /// Host regexes; when non-empty a host must fully match one of them
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// URL regexes; a URL fully matching any of them is never crawled
    #[serde(rename = "exclude-patterns", default)]
    pub exclude_patterns: Vec<String>,
}

/// Timeouts and backoff intervals
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// How long a batch poll may block (milliseconds)
    #[serde(rename = "poll-timeout-ms", default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Page fetch timeout (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// robots.txt fetch timeout (milliseconds)
    #[serde(rename = "robots-timeout-ms", default = "default_robots_timeout_ms")]
    pub robots_timeout_ms: u64,

    /// Sleep after a failed poll or commit before trying again (milliseconds)
    #[serde(rename = "error-backoff-ms", default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

/// Frontier queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of requests returned by a single poll
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding pages and the frontier
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl CrawlerConfig {
    /// Minimum spacing between fetch starts on one host
    pub fn crawl_delay(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.crawl_delay_ms as i64)
    }

    /// Number of batch workers: `max(1, max_concurrent_requests / batch_worker_divisor)`
    pub fn worker_count(&self) -> usize {
        let divisor = self.batch_worker_divisor.max(1);
        ((self.max_concurrent_requests / divisor) as usize).max(1)
    }
}

impl TimeoutConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_millis(self.robots_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrent_requests: default_max_concurrent_requests(),
            batch_worker_divisor: default_batch_worker_divisor(),
            crawl_delay_ms: default_crawl_delay_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            enable_delay_retry: true,
            respect_robots_txt: true,
            user_agent: default_user_agent(),
            seed_urls: Vec::new(),
            allowed_domains: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            robots_timeout_ms: default_robots_timeout_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_depth() -> u32 {
    10
}

fn default_max_concurrent_requests() -> u32 {
    100
}

fn default_batch_worker_divisor() -> u32 {
    10
}

fn default_crawl_delay_ms() -> u64 {
    1000
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "DistributedCrawler/1.0".to_string()
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_robots_timeout_ms() -> u64 {
    10_000
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    50
}
