//! Tokio adapter for `ladderq-core`.
//!
//! This crate provides async wrappers around the blocking queue:
//! - `AsyncQueue` for push/pop from async code via the blocking pool
//! - `AsyncWorkerReceiver` for a dedicated pop thread feeding a channel,
//!   usable as a `Stream`

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use futures_core::Stream;
pub use ladderq_core::{
    BucketSnapshot, PreemptiveMode, Priority, PriorityQueue, PushError, QueueConfig, QueueError,
    QueueSnapshot, QueueStats,
};
use thiserror::Error;
use tokio::sync::mpsc;

const WORKER_POP_TIMEOUT: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum AsyncError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("blocking queue task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Async wrapper around [`PriorityQueue`].
pub struct AsyncQueue<T> {
    inner: Arc<PriorityQueue<T>>,
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AsyncQueue<T> {
    /// Creates a new async wrapper over a shared queue.
    pub fn new(inner: Arc<PriorityQueue<T>>) -> Self {
        Self { inner }
    }

    /// Returns the shared queue.
    pub fn inner(&self) -> &Arc<PriorityQueue<T>> {
        &self.inner
    }

    /// Non-blocking push.
    pub fn try_push(&self, item: T, priority: Priority) -> Result<(), PushError<T>> {
        self.inner.try_push(item, priority)
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.try_pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }
}

impl<T: Send + 'static> AsyncQueue<T> {
    /// Performs a blocking push on a Tokio blocking thread.
    pub async fn push_async(&self, item: T, priority: Priority) -> Result<(), AsyncError> {
        let queue = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || queue.push(item, priority)).await??;
        Ok(())
    }

    /// Performs a blocking pop on a Tokio blocking thread.
    ///
    /// The blocking thread stays parked until an item arrives, even if the
    /// returned future is dropped.
    pub async fn pop_async(&self) -> Result<T, AsyncError> {
        let queue = Arc::clone(&self.inner);
        Ok(tokio::task::spawn_blocking(move || queue.pop()).await?)
    }

    /// Returns a receiver powered by a dedicated pop thread.
    ///
    /// Up to `buffer` items leave the queue before they are received; they
    /// are handed back to the queue when the receiver is dropped.
    pub fn receiver_with_worker(&self, buffer: usize) -> AsyncWorkerReceiver<T> {
        AsyncWorkerReceiver::new(self.clone(), buffer)
    }
}

/// Receiver/stream adapter backed by a dedicated pop thread.
///
/// The worker pops in queue order and buffers up to `buffer` items in a
/// bounded channel ahead of the receiver. Dropping the receiver stops the
/// worker and puts every undelivered item back at the front of its bucket,
/// so buffered items are not lost. An item that no longer fits because
/// producers refilled the queue in the meantime is dropped with a warning.
pub struct AsyncWorkerReceiver<T> {
    rx: mpsc::Receiver<(Priority, T)>,
    queue: Arc<PriorityQueue<T>>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> AsyncWorkerReceiver<T> {
    /// Creates a new worker-backed receiver.
    pub fn new(queue: AsyncQueue<T>, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let queue = Arc::clone(queue.inner());

        let worker = {
            let stop = Arc::clone(&stop);
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let Some(entry) = queue.pop_with_priority_timeout(WORKER_POP_TIMEOUT) else {
                        continue;
                    };
                    if let Err(mpsc::error::SendError((priority, item))) = tx.blocking_send(entry)
                    {
                        tracing::debug!(priority, "receiver closed, returning in-flight item");
                        hand_back(&queue, priority, item);
                        break;
                    }
                }
            })
        };

        Self {
            rx,
            queue,
            stop,
            worker: Some(worker),
        }
    }

    /// Waits for the next item, returning `None` once the worker stops.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await.map(|(_, item)| item)
    }
}

impl<T> Drop for AsyncWorkerReceiver<T> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.rx.close();
        if let Some(Err(_)) = self.worker.take().map(thread::JoinHandle::join) {
            tracing::warn!("queue worker thread panicked");
        }

        // The in-flight item is already back at the front of its bucket.
        // Buffered items were popped before it, so they go back last.
        let mut buffered = Vec::new();
        while let Ok(entry) = self.rx.try_recv() {
            buffered.push(entry);
        }
        for (priority, item) in buffered.into_iter().rev() {
            hand_back(&self.queue, priority, item);
        }
    }
}

impl<T> Stream for AsyncWorkerReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|entry| entry.map(|(_, item)| item))
    }
}

fn hand_back<T>(queue: &PriorityQueue<T>, priority: Priority, item: T) {
    if let Err(err) = queue.requeue(item, priority) {
        tracing::warn!(priority, %err, "undelivered item dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Instant;

    fn queue(capacity: usize) -> AsyncQueue<u64> {
        AsyncQueue::new(Arc::new(PriorityQueue::new(QueueConfig::new(capacity))))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn push_and_pop_roundtrip() {
        let queue = queue(8);
        queue.push_async(7, 2).await.expect("push");
        queue.push_async(3, 1).await.expect("push");

        assert_eq!(queue.pop_async().await.expect("pop"), 3);
        assert_eq!(queue.pop_async().await.expect("pop"), 7);
        assert!(queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn push_async_rejects_invalid_priority() {
        let queue = queue(8);
        let err = queue.push_async(1, 0).await.expect_err("priority 0");
        assert!(matches!(
            err,
            AsyncError::Queue(QueueError::InvalidPriority(0))
        ));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pop_async_waits_for_push() {
        let queue = queue(4);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop_async().await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!consumer.is_finished());
        queue.try_push(11, 5).expect("push");

        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop timed out")
            .expect("join")
            .expect("pop");
        assert_eq!(item, 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_receiver_observes_throttled_order() {
        let queue = queue(16);
        for (item, priority) in [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2)] {
            queue.try_push(item, priority).expect("push");
        }

        let mut receiver = queue.receiver_with_worker(16);
        let mut observed = Vec::new();
        for _ in 0..5 {
            let item = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("worker recv timed out")
                .expect("expected popped item");
            observed.push(item);
        }

        assert_eq!(observed, vec![1, 2, 4, 3, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_receiver_is_a_stream() {
        let queue = queue(4);
        queue.try_push(21, 3).expect("push");

        let mut stream = queue.receiver_with_worker(4);
        let item = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream timed out")
            .expect("stream item");
        assert_eq!(item, 21);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_receiver_drop_stops_worker() {
        let queue = queue(4);

        let start = Instant::now();
        {
            let _receiver = queue.receiver_with_worker(8);
        }
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "worker drop should join promptly"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_worker_receiver_returns_undelivered_items() {
        let queue = queue(16);
        for item in 1..=5 {
            queue.try_push(item, 1).expect("push");
        }

        let mut receiver = queue.receiver_with_worker(16);
        let first = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("worker recv timed out")
            .expect("expected popped item");
        assert_eq!(first, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(receiver);

        assert_eq!(queue.len(), 4);
        let rest: Vec<u64> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(rest, vec![2, 3, 4, 5]);
    }
}
