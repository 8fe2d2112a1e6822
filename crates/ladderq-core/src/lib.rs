//! Bounded, thread-safe, multi-level priority queue with starvation prevention.
//!
//! Producers push items tagged with an integer priority (`1` is the most
//! urgent). Consumers pop from the most urgent non-empty level, with two
//! layers of fairness on top:
//!
//! - Throttling: after `throttle_rate` consecutive pops from level `x`, the
//!   next pop is served from level `x + 1` if that level holds items.
//! - Preemption: every `preemptive_size` pops either ages all items one level
//!   ([`PreemptiveMode::Aging`]) or toggles a sweep that walks every present
//!   level in round-robin order ([`PreemptiveMode::NextPriority`]).
//!
//! `push` blocks while the queue is full and `pop` blocks while it is empty.
//! Non-blocking and deadline-bounded variants are provided alongside.
//!
//! The core is runtime-agnostic. The Tokio adapter lives in `ladderq-async`.

mod api;
pub mod prometheus;
mod queue;
mod state;

pub use api::{
    BucketSnapshot, PreemptiveMode, Priority, PushError, QueueConfig, QueueError, QueueSnapshot,
    QueueStats,
};
pub use queue::PriorityQueue;
