use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

/// Urgency tag attached to every pushed item.
///
/// `1` is the most urgent level and there is no upper bound. The type is signed
/// so that zero and negative values can be rejected at push time instead of
/// being silently unrepresentable.
pub type Priority = i64;

/// Mechanism that keeps low-urgency items from waiting forever.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PreemptiveMode {
    /// Every trigger moves the contents of each bucket one level closer to `1`.
    #[default]
    Aging,
    /// Every trigger toggles a sweep during which pops walk all present
    /// priorities in ascending round-robin order.
    NextPriority,
}

/// Queue configuration.
///
/// - `capacity` bounds the number of items held; `push` blocks at this size.
/// - `throttle_rate` pops served from one priority before the adjacent level
///   is forced to supply the next pop.
/// - `preemptive_size` pops between fairness triggers; `0` disables them.
/// - `preemptive_mode` selects which fairness mechanism runs on a trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    pub throttle_rate: u64,
    pub preemptive_size: u64,
    pub preemptive_mode: PreemptiveMode,
}

impl QueueConfig {
    pub const DEFAULT_THROTTLE_RATE: u64 = 2;
    pub const DEFAULT_PREEMPTIVE_SIZE: u64 = 50;

    /// Creates a configuration with the given capacity and default fairness settings.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            throttle_rate: Self::DEFAULT_THROTTLE_RATE,
            preemptive_size: Self::DEFAULT_PREEMPTIVE_SIZE,
            preemptive_mode: PreemptiveMode::default(),
        }
    }

    pub fn with_throttle_rate(mut self, throttle_rate: u64) -> Self {
        self.throttle_rate = throttle_rate;
        self
    }

    /// Number of pops between fairness triggers. `0` turns the mechanism off.
    pub fn with_preemptive_size(mut self, preemptive_size: u64) -> Self {
        self.preemptive_size = preemptive_size;
        self
    }

    pub fn with_preemptive_mode(mut self, mode: PreemptiveMode) -> Self {
        self.preemptive_mode = mode;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Priorities start at 1.
    #[error("priority must be greater than or equal to 1, got {0}")]
    InvalidPriority(Priority),
}

/// Failure of a non-blocking or bounded-wait push. The item is handed back.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum PushError<T> {
    #[error(transparent)]
    Invalid(#[from] QueueError),
    #[error("queue is at capacity")]
    Full(T),
    #[error("timed out waiting for queue capacity")]
    Timeout(T),
}

impl<T> PushError<T> {
    /// Recovers the rejected item, if the queue still owned it.
    pub fn into_inner(self) -> Option<T> {
        match self {
            PushError::Invalid(_) => None,
            PushError::Full(item) | PushError::Timeout(item) => Some(item),
        }
    }
}

/// Lifetime counters and current gauges of a queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total items accepted.
    pub pushed: u64,
    /// Total items handed to consumers.
    pub popped: u64,
    /// Times the throttle rule scheduled a forced source.
    pub forced_promotions: u64,
    /// Completed aging passes.
    pub aging_runs: u64,
    pub sweep_activations: u64,
    pub sweep_deactivations: u64,
    pub len: usize,
    pub capacity: usize,
    /// Number of non-empty priority buckets.
    pub buckets: usize,
    pub sweep_active: bool,
    /// Pops left in the current sweep; meaningless when `sweep_active` is false.
    pub sweep_remaining: u64,
}

/// Contents of one bucket captured by [`crate::PriorityQueue::snapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketSnapshot<T> {
    pub priority: Priority,
    /// Items in pop order.
    pub items: Vec<T>,
    /// Consecutive pops from this priority since its throttle last fired.
    pub popped: u64,
}

/// Read-only diagnostic view of a queue, ordered from most to least urgent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSnapshot<T> {
    pub capacity: usize,
    pub throttle_rate: u64,
    pub len: usize,
    pub buckets: Vec<BucketSnapshot<T>>,
}

impl<T> BucketSnapshot<T> {
    pub(crate) fn capture(priority: Priority, items: &VecDeque<T>, popped: u64) -> Self
    where
        T: Clone,
    {
        Self {
            priority,
            items: items.iter().cloned().collect(),
            popped,
        }
    }
}

impl<T: fmt::Display> fmt::Display for QueueSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------------------------------")?;
        writeln!(
            f,
            "PriorityQueue(capacity={}, throttle_rate={}, len={})",
            self.capacity, self.throttle_rate, self.len
        )?;
        for bucket in &self.buckets {
            write!(
                f,
                "priority={} popped_count={} items :",
                bucket.priority, bucket.popped
            )?;
            for item in &bucket.items {
                write!(f, " {item}")?;
            }
            writeln!(f)?;
        }
        write!(f, "----------------------------------")
    }
}
