//! Delayed re-enqueue of requests that must wait for a host's crawl delay
//!
//! A single timer task owns a min-heap of pending retries and sleeps until
//! the earliest one is due. Firing a retry is one enqueue; a failed enqueue
//! is logged and the retry is dropped.

use crate::queue::FrontierProducer;
use crate::state::CrawlRequest;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A request waiting for its fire time
#[derive(Debug)]
struct PendingRetry {
    fire_at: DateTime<Utc>,
    /// Insertion order, so retries due at the same instant fire FIFO
    seq: u64,
    request: CrawlRequest,
}

// Earliest fire time is popped first from the max-heap
impl Ord for PendingRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingRetry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for PendingRetry {}

/// Timer facility turning `RetryLater` decisions into delayed enqueues
///
/// Dropping the scheduler (or calling [`RetryScheduler::close`]) stops new
/// retries from being accepted; timers already pending still fire.
pub struct RetryScheduler {
    sender: mpsc::UnboundedSender<PendingRetry>,
    producer: Arc<dyn FrontierProducer>,
    pending: Arc<AtomicUsize>,
    next_seq: AtomicU64,
    handle: JoinHandle<()>,
}

impl RetryScheduler {
    /// Starts the timer task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(producer: Arc<dyn FrontierProducer>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(run_timer_loop(
            receiver,
            Arc::clone(&producer),
            Arc::clone(&pending),
        ));

        Self {
            sender,
            producer,
            pending,
            next_seq: AtomicU64::new(0),
            handle,
        }
    }

    /// Schedules `request` to be enqueued again at `retry_at`
    ///
    /// The enqueued copy has `retry_count + 1` and `scheduled_for = retry_at`.
    /// If `retry_at` is not in the future it is enqueued before returning.
    ///
    /// # Returns
    ///
    /// The request as it will be (or was) enqueued
    pub async fn schedule_retry(
        &self,
        request: &CrawlRequest,
        retry_at: DateTime<Utc>,
    ) -> CrawlRequest {
        let retried = request.with_retry(retry_at);

        if retry_at <= Utc::now() {
            enqueue_retry(self.producer.as_ref(), retried.clone()).await;
            return retried;
        }

        let entry = PendingRetry {
            fire_at: retry_at,
            seq: self.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            request: retried.clone(),
        };

        self.pending.fetch_add(1, AtomicOrdering::SeqCst);
        if let Err(mpsc::error::SendError(entry)) = self.sender.send(entry) {
            // Timer task is gone; enqueue now rather than lose the request
            self.pending.fetch_sub(1, AtomicOrdering::SeqCst);
            tracing::warn!(
                "Retry timer unavailable, enqueueing {} immediately",
                entry.request.url
            );
            enqueue_retry(self.producer.as_ref(), entry.request).await;
        }

        retried
    }

    /// Number of retries waiting for their fire time
    pub fn pending(&self) -> usize {
        self.pending.load(AtomicOrdering::SeqCst)
    }

    /// Stops accepting retries and waits until every pending one has fired
    pub async fn close(self) {
        let Self { sender, handle, .. } = self;
        drop(sender);
        if let Err(e) = handle.await {
            tracing::error!("Retry timer task failed: {}", e);
        }
    }
}

async fn enqueue_retry(producer: &dyn FrontierProducer, request: CrawlRequest) {
    let url = request.url.clone();
    let retry_count = request.retry_count;
    match producer.enqueue(request).await {
        Ok(()) => tracing::debug!("Re-enqueued {} (retry {})", url, retry_count),
        Err(e) => tracing::warn!("Dropping retry for {}: {}", url, e),
    }
}

/// How long to sleep until `fire_at`, zero if it has passed
fn delay_until(fire_at: DateTime<Utc>) -> Duration {
    (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

async fn run_timer_loop(
    mut receiver: mpsc::UnboundedReceiver<PendingRetry>,
    producer: Arc<dyn FrontierProducer>,
    pending: Arc<AtomicUsize>,
) {
    let mut heap: BinaryHeap<PendingRetry> = BinaryHeap::new();
    let mut accepting = true;

    loop {
        let now = Utc::now();
        while heap.peek().is_some_and(|next| next.fire_at <= now) {
            if let Some(due) = heap.pop() {
                enqueue_retry(producer.as_ref(), due.request).await;
                pending.fetch_sub(1, AtomicOrdering::SeqCst);
            }
        }

        if !accepting && heap.is_empty() {
            break;
        }

        let next_fire = heap.peek().map(|next| next.fire_at);
        let sleep = async move {
            match next_fire {
                Some(fire_at) => tokio::time::sleep(delay_until(fire_at)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            received = receiver.recv(), if accepting => match received {
                Some(entry) => heap.push(entry),
                None => accepting = false,
            },
            _ = sleep => {}
        }
    }

    tracing::debug!("Retry timer stopped");
}
