use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::thread;
use std::time::Duration;

use ladderq_core::{PreemptiveMode, PriorityQueue, QueueConfig, prometheus};
use tracing::{info, warn};

// Core-only walkthrough: scripted pushes/pops with the diagnostic dump in
// between, then a threaded run with the next-priority sweep enabled.

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    scripted_walkthrough();
    threaded_sweep();
}

fn scripted_walkthrough() {
    let queue = PriorityQueue::new(QueueConfig::new(1000).with_throttle_rate(2));

    for value in [4, 1, 3, 2, 1] {
        push(&queue, value);
    }
    println!("{}", queue.snapshot());

    pop(&queue);
    pop(&queue);
    pop(&queue);
    push(&queue, 2);
    println!("{}", queue.snapshot());

    push(&queue, 3);
    println!("{}", queue.snapshot());

    pop(&queue);
    pop(&queue);
    println!("{}", queue.snapshot());

    push(&queue, 1);
    pop(&queue);
    pop(&queue);
    println!("{}", queue.snapshot());

    push(&queue, 5);
    pop(&queue);
    push(&queue, 4);
    println!("{}", queue.snapshot());

    pop(&queue);
    push(&queue, 1);
    pop(&queue);

    if let Err(err) = queue.push(0, 0) {
        warn!(%err, "rejected as expected");
    }
}

fn push(queue: &PriorityQueue<i64>, value: i64) {
    match queue.push(value, value) {
        Ok(()) => info!(value, "push"),
        Err(err) => warn!(value, %err, "push failed"),
    }
}

fn pop(queue: &PriorityQueue<i64>) {
    let value = queue.pop();
    info!(value, "pop");
}

fn threaded_sweep() {
    let queue = Arc::new(PriorityQueue::new(
        QueueConfig::new(64)
            .with_throttle_rate(4)
            .with_preemptive_size(20)
            .with_preemptive_mode(PreemptiveMode::NextPriority),
    ));
    let served: Arc<[AtomicU64; 5]> = Arc::new(std::array::from_fn(|_| AtomicU64::new(0)));
    let total = 400usize;

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for seq in 0..total {
                let priority = (seq % 5) as i64 + 1;
                if let Err(err) = queue.push(priority, priority) {
                    warn!(%err, "producer stopped");
                    return;
                }
            }
        })
    };

    let consumer = {
        let queue = Arc::clone(&queue);
        let served = Arc::clone(&served);
        thread::spawn(move || {
            for _ in 0..total {
                let priority = queue.pop();
                served[(priority - 1) as usize].fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    if producer.join().is_err() {
        warn!("producer thread panicked");
    }
    if consumer.join().is_err() {
        warn!("consumer thread panicked");
    }

    for (level, count) in served.iter().enumerate() {
        println!("priority={} served={}", level + 1, count.load(Ordering::Relaxed));
    }
    print!("{}", prometheus::render_stats(&queue.stats(), "walkthrough"));
}
