use std::collections::HashSet;

use ladderq_core::{PreemptiveMode, PriorityQueue, QueueConfig};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Push(i64),
    Pop,
    Aging,
    Sweep,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1i64..=8).prop_map(Op::Push),
        3 => Just(Op::Pop),
        1 => Just(Op::Aging),
        1 => Just(Op::Sweep),
    ]
}

fn mode_strategy() -> impl Strategy<Value = PreemptiveMode> {
    prop_oneof![Just(PreemptiveMode::Aging), Just(PreemptiveMode::NextPriority)]
}

proptest! {
    #[test]
    fn non_blocking_ops_respect_capacity_and_conserve_items(
        capacity in 1usize..=12,
        throttle_rate in 1u64..=4,
        preemptive_size in 0u64..=6,
        mode in mode_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200)
    ) {
        let queue = PriorityQueue::new(
            QueueConfig::new(capacity)
                .with_throttle_rate(throttle_rate)
                .with_preemptive_size(preemptive_size)
                .with_preemptive_mode(mode),
        );
        let mut outstanding: HashSet<u64> = HashSet::new();
        let mut next_id = 0u64;

        for op in ops {
            match op {
                Op::Push(priority) => {
                    let accepted = queue.try_push(next_id, priority).is_ok();
                    prop_assert_eq!(accepted, outstanding.len() < capacity);
                    if accepted {
                        outstanding.insert(next_id);
                    }
                    next_id += 1;
                }
                Op::Pop => match queue.try_pop() {
                    Some(id) => prop_assert!(outstanding.remove(&id)),
                    None => prop_assert!(outstanding.is_empty()),
                },
                Op::Aging => queue.aging(),
                Op::Sweep => queue.activate_sweep_mode(),
            }

            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), outstanding.len());

            let snapshot = queue.snapshot();
            prop_assert!(snapshot.buckets.iter().all(|bucket| !bucket.items.is_empty()));
            prop_assert!(snapshot.buckets.windows(2).all(|w| w[0].priority < w[1].priority));
            prop_assert!(snapshot.buckets.iter().all(|bucket| bucket.priority >= 1));
            let held: usize = snapshot.buckets.iter().map(|bucket| bucket.items.len()).sum();
            prop_assert_eq!(held, snapshot.len);
        }
    }

    #[test]
    fn ids_within_a_priority_leave_in_push_order(
        count in 1usize..60
    ) {
        let queue = PriorityQueue::new(QueueConfig::new(64).with_preemptive_size(0));
        for id in 0..count {
            queue.push(id, 7).unwrap();
        }
        let drained: Vec<usize> = (0..count).map(|_| queue.pop()).collect();
        prop_assert_eq!(drained, (0..count).collect::<Vec<_>>());
    }
}
