//! Crawler coordinator - batch worker orchestration
//!
//! A single poll loop owns the frontier consumer. It polls batches, hands each
//! one to its own task, and commits once every batch polled so far has been
//! fully dispatched. At most `worker_count` batches are uncommitted at any
//! time. Inside a batch every request runs as an independent task and the
//! batch finishes when all of them have.
//!
//! Stopping sets a flag read at the top of the poll loop. Batches already in
//! flight run to completion and are committed; pending retry timers keep
//! running until they fire.

use crate::config::Config;
use crate::crawler::decision::{decide, AdmissionContext, AdmissionPolicy, Decision};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::pipeline::{Pipeline, PipelineOutcome};
use crate::crawler::scheduler::RetryScheduler;
use crate::output::{CrawlStatistics, EngineCounters};
use crate::queue::{FrontierConsumer, FrontierProducer, QueueError};
use crate::robots::RobotsCache;
use crate::state::{CrawlRequest, PolitenessTracker};
use crate::storage::Storage;
use crate::url::{parse_with_host, DomainFilter};
use crate::{CrawlError, Result, UrlError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Lifecycle state of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    Stopped,
    Running,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Snapshot returned by [`Coordinator::status`]
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    /// Time since the current run started; `None` while stopped
    pub uptime: Option<Duration>,
    /// Maximum number of batches processed concurrently
    pub workers: usize,
    /// Retries waiting for their fire time in the current run
    pub pending_retries: usize,
    pub statistics: CrawlStatistics,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    filter: Arc<DomainFilter>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Storage>,
    producer: Arc<dyn FrontierProducer>,
    consumer: Option<Box<dyn FrontierConsumer>>,
    counters: Arc<EngineCounters>,
    run: Option<ActiveRun>,
}

/// Handles of a started run
struct ActiveRun {
    stop: Arc<AtomicBool>,
    engine: Arc<Engine>,
    poll_loop: JoinHandle<Box<dyn FrontierConsumer>>,
    started_at: Instant,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Used for pages and robots.txt
    /// * `storage` - Where pages are stored and deduplicated
    /// * `producer` - Write side of the frontier
    /// * `consumer` - Read side of the frontier, owned by the poll loop
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - A domain or exclude pattern failed to compile
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
        producer: Arc<dyn FrontierProducer>,
        consumer: Box<dyn FrontierConsumer>,
    ) -> Result<Self> {
        let filter = DomainFilter::from_config(&config.crawler)?;

        Ok(Self {
            config: Arc::new(config),
            filter: Arc::new(filter),
            fetcher,
            storage,
            producer,
            consumer: Some(consumer),
            counters: Arc::new(EngineCounters::new()),
            run: None,
        })
    }

    /// Enqueues the configured seeds and starts the poll loop
    ///
    /// Politeness and robots state start empty on every start.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The coordinator is running
    /// * `Err(CrawlError::AlreadyRunning)` - `start` was called twice
    pub async fn start(&mut self) -> Result<()> {
        if self.run.is_some() {
            return Err(CrawlError::AlreadyRunning);
        }
        let consumer = self.consumer.take().ok_or(QueueError::Closed)?;

        let seeds = self.config.crawler.seed_urls.clone();
        let seeded = self.add_seed_urls(&seeds).await;
        tracing::info!("Enqueued {} of {} seed URLs", seeded, seeds.len());

        let timeouts = &self.config.timeouts;
        let politeness = Arc::new(PolitenessTracker::new());
        let engine = Arc::new(Engine {
            policy: AdmissionPolicy::from_config(&self.config.crawler),
            filter: Arc::clone(&self.filter),
            politeness: Arc::clone(&politeness),
            robots: RobotsCache::new(Arc::clone(&self.fetcher), timeouts.robots_timeout()),
            pipeline: Pipeline::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.storage),
                Arc::clone(&self.producer),
                politeness,
                self.config.crawler.crawl_delay(),
                Arc::clone(&self.filter),
                timeouts.fetch_timeout(),
            ),
            retry: RetryScheduler::spawn(Arc::clone(&self.producer)),
            producer: Arc::clone(&self.producer),
            counters: Arc::clone(&self.counters),
        });

        let settings = LoopSettings {
            workers: self.config.crawler.worker_count(),
            poll_timeout: timeouts.poll_timeout(),
            error_backoff: timeouts.error_backoff(),
        };
        tracing::info!(
            "Starting coordinator with {} batch workers (batch size {})",
            settings.workers,
            self.config.queue.batch_size
        );

        let stop = Arc::new(AtomicBool::new(false));
        let poll_loop = tokio::spawn(run_poll_loop(
            Arc::clone(&engine),
            consumer,
            Arc::clone(&stop),
            settings,
        ));

        self.run = Some(ActiveRun {
            stop,
            engine,
            poll_loop,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Stops polling and waits for in-flight batches to finish and commit
    ///
    /// Stopping a stopped coordinator does nothing.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };

        tracing::info!("Stopping coordinator");
        run.stop.store(true, Ordering::SeqCst);

        let consumer = run.poll_loop.await?;
        self.consumer = Some(consumer);

        let pending = run.engine.retry.pending();
        if pending > 0 {
            tracing::info!("{} scheduled retries will still fire", pending);
        }
        tracing::info!("Coordinator stopped");
        Ok(())
    }

    /// Enqueues a depth-0 request for `url`
    ///
    /// Works whether or not the coordinator is running.
    pub async fn add_seed_url(&self, url: &str) -> Result<()> {
        let (parsed, _) = parse_with_host(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UrlError::UnsupportedScheme(url.to_string()).into());
        }
        self.producer.enqueue(CrawlRequest::seed(url)).await?;
        Ok(())
    }

    /// Enqueues several seeds, logging the ones that fail
    ///
    /// # Returns
    ///
    /// The number of seeds enqueued
    pub async fn add_seed_urls<S: AsRef<str>>(&self, urls: &[S]) -> usize {
        let mut added = 0;
        for url in urls {
            match self.add_seed_url(url.as_ref()).await {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!("Failed to add seed {}: {}", url.as_ref(), e),
            }
        }
        added
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn statistics(&self) -> CrawlStatistics {
        self.counters.snapshot()
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            state: if self.is_running() {
                CoordinatorState::Running
            } else {
                CoordinatorState::Stopped
            },
            uptime: self.run.as_ref().map(|run| run.started_at.elapsed()),
            workers: self.config.crawler.worker_count(),
            pending_retries: self
                .run
                .as_ref()
                .map_or(0, |run| run.engine.retry.pending()),
            statistics: self.counters.snapshot(),
        }
    }
}

/// State shared by every batch task of one run
struct Engine {
    policy: AdmissionPolicy,
    filter: Arc<DomainFilter>,
    politeness: Arc<PolitenessTracker>,
    robots: RobotsCache,
    pipeline: Pipeline,
    retry: RetryScheduler,
    producer: Arc<dyn FrontierProducer>,
    counters: Arc<EngineCounters>,
}

impl Engine {
    /// Runs every request of a batch concurrently and waits for all of them
    async fn process_batch(self: Arc<Self>, batch: Vec<CrawlRequest>) {
        let mut tasks = JoinSet::new();
        for request in batch {
            let engine = Arc::clone(&self);
            tasks.spawn(async move { engine.dispatch(request).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                EngineCounters::incr(&self.counters.failed);
                log_task_failure("Request", e);
            }
        }
    }

    /// Admits one request and routes it to the pipeline, the retry timer or nowhere
    async fn dispatch(&self, request: CrawlRequest) {
        let counters = &self.counters;
        let now = Utc::now();

        if !request.is_ready(now) {
            EngineCounters::incr(&counters.deferred);
            tracing::debug!(
                "{} not due until {:?}, re-enqueueing",
                request.url,
                request.scheduled_for
            );
            let url = request.url.clone();
            if let Err(e) = self.producer.enqueue(request).await {
                tracing::warn!("Failed to re-enqueue deferred {}: {}", url, e);
            }
            return;
        }

        let ctx = AdmissionContext {
            policy: &self.policy,
            filter: self.filter.as_ref(),
            politeness: self.politeness.as_ref(),
            robots: &self.robots,
        };

        match decide(&request, &ctx, now).await {
            Decision::Crawl => match self.pipeline.process(&request).await {
                Ok(PipelineOutcome::Stored { links_enqueued, .. }) => {
                    EngineCounters::incr(&counters.crawled);
                    EngineCounters::incr(&counters.stored);
                    EngineCounters::add(&counters.links_enqueued, links_enqueued as u64);
                }
                Ok(PipelineOutcome::Duplicate { .. }) => {
                    EngineCounters::incr(&counters.crawled);
                    EngineCounters::incr(&counters.duplicates);
                }
                // Lost the race for the host to a request admitted at the same time
                Ok(PipelineOutcome::Deferred { retry_at }) => {
                    let host = parse_with_host(&request.url)
                        .map(|(_, host)| host)
                        .unwrap_or_default();
                    let reason = format!("crawl delay not satisfied for {}", host);
                    if self.policy.enable_delay_retry {
                        self.retry_later(&request, retry_at, &reason).await;
                    } else {
                        EngineCounters::incr(&counters.rejected);
                        tracing::debug!("Rejected {}: {}", request.url, reason);
                    }
                }
                Err(e) => {
                    EngineCounters::incr(&counters.crawled);
                    EngineCounters::incr(&counters.failed);
                    tracing::warn!("Failed to crawl {}: {}", request.url, e);
                }
            },
            Decision::RetryLater { reason, retry_at } => {
                self.retry_later(&request, retry_at, &reason).await;
            }
            Decision::Reject { reason } => {
                EngineCounters::incr(&counters.rejected);
                tracing::debug!("Rejected {}: {}", request.url, reason);
            }
        }
    }

    async fn retry_later(&self, request: &CrawlRequest, retry_at: DateTime<Utc>, reason: &str) {
        EngineCounters::incr(&self.counters.retries_scheduled);
        tracing::debug!("Retrying {} at {}: {}", request.url, retry_at, reason);
        self.retry.schedule_retry(request, retry_at).await;
    }
}

#[derive(Debug, Clone, Copy)]
struct LoopSettings {
    workers: usize,
    poll_timeout: Duration,
    error_backoff: Duration,
}

fn log_task_failure(kind: &str, error: JoinError) {
    if error.is_panic() {
        tracing::error!("{} task panicked: {}", kind, error);
    } else {
        tracing::error!("{} task failed: {}", kind, error);
    }
}

/// The single owner of the frontier consumer
///
/// Returns the consumer once stopped so the coordinator can be restarted.
async fn run_poll_loop(
    engine: Arc<Engine>,
    mut consumer: Box<dyn FrontierConsumer>,
    stop: Arc<AtomicBool>,
    settings: LoopSettings,
) -> Box<dyn FrontierConsumer> {
    let counters = Arc::clone(&engine.counters);
    let mut in_flight: JoinSet<()> = JoinSet::new();
    // Batches polled since the last successful commit
    let mut uncommitted: u64 = 0;

    loop {
        while let Some(result) = in_flight.try_join_next() {
            if let Err(e) = result {
                log_task_failure("Batch", e);
            }
        }

        if stop.load(Ordering::SeqCst) {
            break;
        }

        // A commit acknowledges everything polled so far, so only commit
        // when no polled batch is still being processed
        if uncommitted > 0 && in_flight.is_empty() {
            match consumer.commit_batch().await {
                Ok(()) => {
                    EngineCounters::add(&counters.batches_committed, uncommitted);
                    uncommitted = 0;
                }
                Err(e) => {
                    tracing::error!("Failed to commit batch: {}", e);
                    tokio::time::sleep(settings.error_backoff).await;
                    continue;
                }
            }
        }

        if uncommitted >= settings.workers as u64 {
            if let Some(Err(e)) = in_flight.join_next().await {
                log_task_failure("Batch", e);
            }
            continue;
        }

        match consumer.poll_batch(settings.poll_timeout).await {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                EngineCounters::incr(&counters.batches_polled);
                EngineCounters::add(&counters.requests_polled, batch.len() as u64);
                tracing::debug!("Polled batch of {} requests", batch.len());

                uncommitted += 1;
                in_flight.spawn(Arc::clone(&engine).process_batch(batch));
            }
            Err(e) => {
                tracing::error!("Failed to poll batch: {}", e);
                tokio::time::sleep(settings.error_backoff).await;
            }
        }
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            log_task_failure("Batch", e);
        }
    }

    if uncommitted > 0 {
        match consumer.commit_batch().await {
            Ok(()) => EngineCounters::add(&counters.batches_committed, uncommitted),
            // Left uncommitted; the frontier redelivers these batches
            Err(e) => tracing::error!("Failed to commit final batches: {}", e),
        }
    }

    consumer
}
