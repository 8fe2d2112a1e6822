use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use ladderq_core::{PreemptiveMode, PriorityQueue, QueueConfig};

const LEVELS: usize = 6;
const WAIT_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug)]
struct Job {
    level: usize,
    enqueued_at: Instant,
}

struct Served {
    by_level: [AtomicU64; LEVELS],
    wait_ns_by_level: [AtomicU64; LEVELS],
}

impl Served {
    fn new() -> Self {
        Self {
            by_level: std::array::from_fn(|_| AtomicU64::new(0)),
            wait_ns_by_level: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

fn main() {
    let run_seconds = 3u64;
    for mode in [PreemptiveMode::Aging, PreemptiveMode::NextPriority] {
        run(mode, run_seconds);
    }
}

fn run(mode: PreemptiveMode, run_seconds: u64) {
    let producer_count = 4usize;
    let consumer_count = 2usize;

    let queue = Arc::new(PriorityQueue::new(
        QueueConfig::new(4_096)
            .with_throttle_rate(2)
            .with_preemptive_size(50)
            .with_preemptive_mode(mode),
    ));

    let running = Arc::new(AtomicBool::new(true));
    let produced_total = Arc::new(AtomicU64::new(0));
    let served = Arc::new(Served::new());

    let mut producers = Vec::new();
    for producer in 0..producer_count {
        producers.push(spawn_producer(
            Arc::clone(&queue),
            Arc::clone(&running),
            Arc::clone(&produced_total),
            producer,
        ));
    }
    let mut consumers = Vec::new();
    for _ in 0..consumer_count {
        consumers.push(spawn_consumer(
            Arc::clone(&queue),
            Arc::clone(&running),
            Arc::clone(&served),
        ));
    }

    println!(
        "bench: mode={:?} producers={} consumers={} levels={} ({}s)",
        mode, producer_count, consumer_count, LEVELS, run_seconds
    );
    let start = Instant::now();
    thread::sleep(Duration::from_secs(run_seconds));
    let elapsed = start.elapsed().as_secs_f64();

    running.store(false, Ordering::Relaxed);
    for handle in producers {
        let _ = handle.join();
    }
    for handle in consumers {
        let _ = handle.join();
    }

    let stats = queue.stats();
    let throughput = if elapsed > 0.0 {
        stats.popped as f64 / elapsed
    } else {
        0.0
    };

    println!(
        "stats: pushed={} popped={} forced={} aging_runs={} sweeps={}/{} len={}",
        stats.pushed,
        stats.popped,
        stats.forced_promotions,
        stats.aging_runs,
        stats.sweep_activations,
        stats.sweep_deactivations,
        stats.len
    );
    println!(
        "derived: throughput={:.1} ops/s produced_total={}",
        throughput,
        produced_total.load(Ordering::Relaxed)
    );
    for level in 0..LEVELS {
        let count = served.by_level[level].load(Ordering::Relaxed);
        let wait_ns = served.wait_ns_by_level[level].load(Ordering::Relaxed);
        let avg_wait_ms = if count > 0 {
            wait_ns as f64 / count as f64 / 1_000_000.0
        } else {
            0.0
        };
        println!(
            "  priority={} served={} avg_wait_ms={:.3}",
            level + 1,
            count,
            avg_wait_ms
        );
    }
}

fn spawn_producer(
    queue: Arc<PriorityQueue<Job>>,
    running: Arc<AtomicBool>,
    produced_total: Arc<AtomicU64>,
    producer: usize,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut seq = producer;
        while running.load(Ordering::Relaxed) {
            seq = seq.wrapping_add(1);
            // Skewed toward urgent levels: level 0 gets about half the traffic.
            let level = (seq.trailing_zeros() as usize).min(LEVELS - 1);
            let job = Job {
                level,
                enqueued_at: Instant::now(),
            };
            if queue.push_timeout(job, level as i64 + 1, WAIT_TIMEOUT).is_ok() {
                produced_total.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

fn spawn_consumer(
    queue: Arc<PriorityQueue<Job>>,
    running: Arc<AtomicBool>,
    served: Arc<Served>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            let Some(job) = queue.pop_timeout(WAIT_TIMEOUT) else {
                continue;
            };
            let wait_ns = job
                .enqueued_at
                .elapsed()
                .as_nanos()
                .min(u128::from(u64::MAX)) as u64;
            served.by_level[job.level].fetch_add(1, Ordering::Relaxed);
            served.wait_ns_by_level[job.level].fetch_add(wait_ns, Ordering::Relaxed);
            // Consumers are slower than producers so the queue stays saturated.
            thread::sleep(Duration::from_micros(20));
        }
    })
}
