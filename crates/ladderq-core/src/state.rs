use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound::{Excluded, Unbounded};

use crate::api::{BucketSnapshot, PreemptiveMode, Priority, QueueStats};

/// Alternating on/off window used by [`PreemptiveMode::NextPriority`].
#[derive(Debug, Default)]
pub(crate) struct SweepState {
    pub(crate) active: bool,
    pub(crate) remaining: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) pushed: u64,
    pub(crate) popped: u64,
    pub(crate) forced_promotions: u64,
    pub(crate) aging_runs: u64,
    pub(crate) sweep_activations: u64,
    pub(crate) sweep_deactivations: u64,
}

/// Everything guarded by the queue mutex.
///
/// Invariants:
/// - no bucket in `buckets` is empty;
/// - `len` equals the sum of bucket lengths;
/// - `forced_source`, when set, names a priority that had a bucket at the time
///   it was scheduled. It is re-resolved on the next pop and dropped if gone.
#[derive(Debug)]
pub(crate) struct QueueState<T> {
    pub(crate) buckets: BTreeMap<Priority, VecDeque<T>>,
    pub(crate) popped_counter: BTreeMap<Priority, u64>,
    pub(crate) forced_source: Option<Priority>,
    pub(crate) global_pops: u64,
    pub(crate) sweep: SweepState,
    pub(crate) len: usize,
    pub(crate) stats: StatsCounters,
    throttle_rate: u64,
    preemptive_size: u64,
    preemptive_mode: PreemptiveMode,
}

impl<T> QueueState<T> {
    pub(crate) fn new(throttle_rate: u64, preemptive_size: u64, mode: PreemptiveMode) -> Self {
        Self {
            buckets: BTreeMap::new(),
            popped_counter: BTreeMap::new(),
            forced_source: None,
            global_pops: 0,
            sweep: SweepState::default(),
            len: 0,
            stats: StatsCounters::default(),
            throttle_rate: throttle_rate.max(1),
            preemptive_size,
            preemptive_mode: mode,
        }
    }

    /// Appends `item` to the back of its priority bucket. Capacity is the caller's concern.
    pub(crate) fn insert(&mut self, priority: Priority, item: T) {
        self.buckets.entry(priority).or_default().push_back(item);
        self.len += 1;
        self.stats.pushed += 1;
    }

    /// Places `item` ahead of everything already waiting at `priority`.
    pub(crate) fn insert_front(&mut self, priority: Priority, item: T) {
        self.buckets.entry(priority).or_default().push_front(item);
        self.len += 1;
        self.stats.pushed += 1;
    }

    /// Removes the next item according to bucket selection, throttling and the
    /// fairness trigger. Returns `None` only when the queue is empty.
    pub(crate) fn take(&mut self) -> Option<(Priority, T)> {
        // One forced selection per pop, consumed whether or not it still applies.
        let forced = self.forced_source.take();
        let priority = match forced.filter(|p| self.buckets.contains_key(p)) {
            Some(priority) => priority,
            None => *self.buckets.keys().next()?,
        };

        let bucket = self.buckets.get_mut(&priority)?;
        let item = bucket.pop_front()?;
        let bucket_drained = bucket.is_empty();

        let rate = if self.sweep.active {
            self.sweep.remaining = self.sweep.remaining.saturating_sub(1);
            1
        } else {
            self.throttle_rate
        };

        let count = self.popped_counter.entry(priority).or_insert(0);
        *count += 1;
        if *count % rate == 0 {
            *count = 0;
            self.schedule_forced_source(priority);
        }

        if bucket_drained {
            self.buckets.remove(&priority);
        }
        self.len -= 1;
        self.stats.popped += 1;

        self.global_pops += 1;
        if self.preemptive_size != 0 && self.global_pops % self.preemptive_size == 0 {
            self.global_pops = 0;
            match self.preemptive_mode {
                PreemptiveMode::Aging => self.age(),
                PreemptiveMode::NextPriority => self.toggle_sweep(),
            }
        }

        Some((priority, item))
    }

    /// The bucket right after `priority` supplies the next pop if it sits at
    /// `priority + 1`, or at any distance while a sweep is running. The
    /// opportunity is not retried when no such bucket exists.
    fn schedule_forced_source(&mut self, priority: Priority) {
        let next = self
            .buckets
            .range((Excluded(priority), Unbounded))
            .next()
            .map(|(next, _)| *next);

        let Some(next) = next else {
            return;
        };
        if self.sweep.active || priority.checked_add(1) == Some(next) {
            tracing::debug!(from = priority, to = next, "forced promotion scheduled");
            self.forced_source = Some(next);
            self.stats.forced_promotions += 1;
        }
    }

    /// Moves the contents of every bucket above priority 1 onto the end of the
    /// bucket one level below, in ascending order.
    ///
    /// Bucket `p` is drained into `p - 1` before `p + 1` is visited, so every
    /// item advances exactly one level per call and gaps wider than one level
    /// take several calls to close.
    pub(crate) fn age(&mut self) {
        self.forced_source = None;

        let floor: Priority = 1;
        let levels: Vec<Priority> = self
            .buckets
            .range((Excluded(floor), Unbounded))
            .map(|(priority, _)| *priority)
            .collect();
        for priority in levels {
            if let Some(mut source) = self.buckets.remove(&priority) {
                self.buckets
                    .entry(priority - 1)
                    .or_default()
                    .append(&mut source);
            }
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());

        self.stats.aging_runs += 1;
        tracing::debug!(buckets = self.buckets.len(), len = self.len, "aging pass complete");
    }

    /// Flips the sweep window. Activation arms it for `preemptive_size` pops.
    pub(crate) fn toggle_sweep(&mut self) {
        if self.sweep.active {
            self.sweep.active = false;
            self.stats.sweep_deactivations += 1;
            tracing::debug!("next-priority sweep deactivated");
        } else {
            self.sweep.active = true;
            self.sweep.remaining = self.preemptive_size;
            self.stats.sweep_activations += 1;
            tracing::debug!(pops = self.preemptive_size, "next-priority sweep activated");
        }
    }

    pub(crate) fn stats(&self, capacity: usize) -> QueueStats {
        QueueStats {
            pushed: self.stats.pushed,
            popped: self.stats.popped,
            forced_promotions: self.stats.forced_promotions,
            aging_runs: self.stats.aging_runs,
            sweep_activations: self.stats.sweep_activations,
            sweep_deactivations: self.stats.sweep_deactivations,
            len: self.len,
            capacity,
            buckets: self.buckets.len(),
            sweep_active: self.sweep.active,
            sweep_remaining: self.sweep.remaining,
        }
    }

    pub(crate) fn bucket_snapshots(&self) -> Vec<BucketSnapshot<T>>
    where
        T: Clone,
    {
        self.buckets
            .iter()
            .map(|(priority, items)| {
                let popped = self.popped_counter.get(priority).copied().unwrap_or(0);
                BucketSnapshot::capture(*priority, items, popped)
            })
            .collect()
    }
}
