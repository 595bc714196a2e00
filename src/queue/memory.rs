//! In-process frontier backed by a FIFO deque

use crate::queue::{FrontierConsumer, FrontierProducer, QueueError, QueueResult};
use crate::state::CrawlRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// FIFO frontier held in memory
///
/// Clones share the same queue, so one clone can be handed to the
/// coordinator as consumer while others act as producers.
#[derive(Debug, Clone)]
pub struct MemoryFrontier {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
    batch_size: usize,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<CrawlRequest>,
    uncommitted: Vec<CrawlRequest>,
    commits: usize,
    closed: bool,
}

impl MemoryFrontier {
    /// Creates an empty frontier returning at most `batch_size` requests per poll
    pub fn new(batch_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                batch_size: batch_size.max(1),
            }),
        }
    }

    /// Requests waiting to be polled
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().queue.is_empty()
    }

    /// Requests polled but not yet committed
    pub fn uncommitted_len(&self) -> usize {
        self.state().uncommitted.len()
    }

    /// Number of successful `commit_batch` calls
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    /// Snapshot of the waiting requests in FIFO order
    pub fn pending(&self) -> Vec<CrawlRequest> {
        self.state().queue.iter().cloned().collect()
    }

    /// Puts every uncommitted request back at the head of the queue
    ///
    /// This is what a consumer restart looks like to the frontier.
    pub fn redeliver_uncommitted(&self) -> usize {
        let mut state = self.state();
        let uncommitted = std::mem::take(&mut state.uncommitted);
        let count = uncommitted.len();
        for request in uncommitted.into_iter().rev() {
            state.queue.push_front(request);
        }
        drop(state);
        if count > 0 {
            self.inner.notify.notify_one();
        }
        count
    }

    /// Rejects all further enqueues with `QueueError::Closed`
    pub fn close(&self) {
        self.state().closed = true;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_batch(&self) -> Vec<CrawlRequest> {
        let mut state = self.state();
        let count = state.queue.len().min(self.inner.batch_size);
        let batch: Vec<CrawlRequest> = state.queue.drain(..count).collect();
        state.uncommitted.extend(batch.iter().cloned());
        batch
    }
}

impl Default for MemoryFrontier {
    fn default() -> Self {
        Self::new(50)
    }
}

#[async_trait]
impl FrontierProducer for MemoryFrontier {
    async fn enqueue(&self, request: CrawlRequest) -> QueueResult<()> {
        {
            let mut state = self.state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.queue.push_back(request);
        }
        self.inner.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl FrontierConsumer for MemoryFrontier {
    async fn poll_batch(&mut self, timeout: Duration) -> QueueResult<Vec<CrawlRequest>> {
        let deadline = Instant::now() + timeout;
        loop {
            let batch = self.take_batch();
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let _ = tokio::time::timeout(deadline - now, self.inner.notify.notified()).await;
        }
    }

    async fn commit_batch(&mut self) -> QueueResult<()> {
        let mut state = self.state();
        state.uncommitted.clear();
        state.commits += 1;
        Ok(())
    }
}
