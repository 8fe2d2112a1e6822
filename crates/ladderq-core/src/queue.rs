use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::api::{Priority, PushError, QueueConfig, QueueError, QueueSnapshot, QueueStats};
use crate::state::QueueState;

/// Bounded, blocking, multi-level priority queue.
///
/// All state lives behind one mutex. `push` waits on `not_full` while the
/// queue is at capacity and `pop` waits on `not_empty` while it holds nothing;
/// each successful operation wakes exactly one waiter on the opposite side.
pub struct PriorityQueue<T> {
    config: QueueConfig,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> PriorityQueue<T> {
    pub fn new(mut config: QueueConfig) -> Self {
        if config.capacity == 0 {
            tracing::warn!("queue capacity of 0 would block every push, using 1");
            config.capacity = 1;
        }
        if config.throttle_rate == 0 {
            tracing::warn!("throttle rate of 0 is undefined, using 1");
            config.throttle_rate = 1;
        }
        let state = QueueState::new(
            config.throttle_rate,
            config.preemptive_size,
            config.preemptive_mode,
        );
        Self {
            config,
            state: Mutex::new(state),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Queue with the given capacity and default fairness settings.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(QueueConfig::new(capacity))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Appends `item` to the bucket for `priority`, blocking while the queue is full.
    ///
    /// Fails without touching the queue when `priority < 1`.
    pub fn push(&self, item: T, priority: Priority) -> Result<(), QueueError> {
        validate(priority)?;
        let mut state = self.state.lock();
        while state.len >= self.config.capacity {
            self.not_full.wait(&mut state);
        }
        self.insert_locked(state, priority, item);
        Ok(())
    }

    /// Like [`push`](Self::push) but returns the item instead of blocking.
    pub fn try_push(&self, item: T, priority: Priority) -> Result<(), PushError<T>> {
        validate(priority)?;
        let state = self.state.lock();
        if state.len >= self.config.capacity {
            return Err(PushError::Full(item));
        }
        self.insert_locked(state, priority, item);
        Ok(())
    }

    /// Like [`push`](Self::push) but gives up once `timeout` has elapsed.
    ///
    /// A timeout too large to express as a deadline waits like `push`.
    pub fn push_timeout(
        &self,
        item: T,
        priority: Priority,
        timeout: Duration,
    ) -> Result<(), PushError<T>> {
        validate(priority)?;
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while state.len >= self.config.capacity {
            let Some(deadline) = deadline else {
                self.not_full.wait(&mut state);
                continue;
            };
            if self.not_full.wait_until(&mut state, deadline).timed_out()
                && state.len >= self.config.capacity
            {
                return Err(PushError::Timeout(item));
            }
        }
        self.insert_locked(state, priority, item);
        Ok(())
    }

    /// Puts an item back at the front of its priority bucket without blocking.
    ///
    /// Meant for consumers handing back items they popped but could not
    /// deliver. Throttle and fairness counters advanced by the original pop
    /// are not rolled back.
    pub fn requeue(&self, item: T, priority: Priority) -> Result<(), PushError<T>> {
        validate(priority)?;
        let mut state = self.state.lock();
        if state.len >= self.config.capacity {
            return Err(PushError::Full(item));
        }
        state.insert_front(priority, item);
        tracing::trace!(priority, len = state.len, "requeue");
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the next item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some((_, item)) = self.take_locked(&mut state) {
                drop(state);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes the next item if one is available.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        let (_, item) = self.take_locked(&mut state)?;
        drop(state);
        self.not_full.notify_one();
        Some(item)
    }

    /// Removes the next item, waiting at most `timeout` for one to arrive.
    ///
    /// A timeout too large to express as a deadline waits like `pop`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.pop_with_priority_timeout(timeout).map(|(_, item)| item)
    }

    /// Like [`pop_timeout`](Self::pop_timeout), also reporting the bucket the
    /// item was served from.
    pub fn pop_with_priority_timeout(&self, timeout: Duration) -> Option<(Priority, T)> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = self.take_locked(&mut state) {
                drop(state);
                self.not_full.notify_one();
                return Some(entry);
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                        let entry = self.take_locked(&mut state)?;
                        drop(state);
                        self.not_full.notify_one();
                        return Some(entry);
                    }
                }
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().len == 0
    }

    /// Runs one aging pass immediately, outside the pop-count trigger.
    ///
    /// Any pending forced source is discarded.
    pub fn aging(&self) {
        self.state.lock().age();
    }

    /// Toggles the next-priority sweep immediately, outside the pop-count trigger.
    pub fn activate_sweep_mode(&self) {
        self.state.lock().toggle_sweep();
    }

    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats(self.config.capacity)
    }

    /// Copies the queue contents for diagnostics. Does not alter any state.
    pub fn snapshot(&self) -> QueueSnapshot<T>
    where
        T: Clone,
    {
        let state = self.state.lock();
        QueueSnapshot {
            capacity: self.config.capacity,
            throttle_rate: self.config.throttle_rate,
            len: state.len,
            buckets: state.bucket_snapshots(),
        }
    }

    fn insert_locked(&self, mut state: MutexGuard<'_, QueueState<T>>, priority: Priority, item: T) {
        state.insert(priority, item);
        tracing::trace!(priority, len = state.len, "push");
        drop(state);
        self.not_empty.notify_one();
    }

    fn take_locked(&self, state: &mut QueueState<T>) -> Option<(Priority, T)> {
        let (priority, item) = state.take()?;
        tracing::trace!(priority, len = state.len, "pop");
        Some((priority, item))
    }
}

fn validate(priority: Priority) -> Result<(), QueueError> {
    if priority < 1 {
        tracing::debug!(priority, "rejected push with invalid priority");
        return Err(QueueError::InvalidPriority(priority));
    }
    Ok(())
}
