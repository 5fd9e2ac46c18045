//! End-to-end tests driving [`conveyor::BoundedQueue`] with real threads.
//!
//! These tests verify the blocking behavior that the unit tests cannot:
//! 1. A producer parked on a full queue is released by a pop
//! 2. A consumer parked on an empty queue is released by a push
//! 3. Shutdown releases every parked thread within bounded time
//! 4. Items are conserved across many producers and consumers
//!
//! # Running with tracing
//!
//! To see which thread parks and wakes where, run with the tracing feature
//! and no capture:
//! ```bash
//! cargo test --features tracing --test producer_consumer -- --nocapture
//! ```
//!
//! You can control the log level via RUST_LOG:
//! ```bash
//! RUST_LOG=conveyor=trace cargo test --features tracing --test producer_consumer -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use conveyor::BoundedQueue;
use conveyor::sync::queue::{PushError, TryPopError};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        conveyor::init_tracing();
    });
}

/// Long enough for a spawned thread to reach its blocking call.
const SETTLE: Duration = Duration::from_millis(50);

#[test]
fn spsc_fifo_across_threads() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(8).unwrap());
    let count = 1000u64;

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..count {
                queue.push(i).unwrap();
            }
            queue.shutdown();
        })
    };

    let mut received = Vec::with_capacity(count as usize);
    while let Some(item) = queue.pop() {
        received.push(item);
    }

    producer.join().unwrap();

    assert_eq!(received.len(), count as usize);
    for (i, &val) in received.iter().enumerate() {
        assert_eq!(val, i as u64);
    }
}

#[test]
fn blocked_producer_released_by_pop() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(1).unwrap());
    queue.push(1).unwrap();

    let delivered = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let delivered = Arc::clone(&delivered);
        thread::spawn(move || {
            queue.push(2).unwrap();
            delivered.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(SETTLE);
    assert!(
        !delivered.load(Ordering::SeqCst),
        "push completed on a full queue"
    );

    assert_eq!(queue.pop(), Some(1));
    producer.join().unwrap();
    assert!(delivered.load(Ordering::SeqCst));
    assert_eq!(queue.pop(), Some(2));
}

#[test]
fn blocked_consumer_released_by_push() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::<u64>::new(4).unwrap());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(SETTLE);
    queue.push(42).unwrap();

    assert_eq!(consumer.join().unwrap(), Some(42));
}

#[test]
fn shutdown_releases_blocked_producer() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(1).unwrap());
    queue.push(1).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(2))
    };

    thread::sleep(SETTLE);
    queue.shutdown();

    // The producer backs out with its item instead of waiting for a slot
    // that may never free up.
    assert_eq!(producer.join().unwrap(), Err(PushError(2)));

    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.pop(), None);
}

#[test]
fn shutdown_releases_blocked_consumer() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::<u64>::new(1).unwrap());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(SETTLE);
    queue.shutdown();

    assert_eq!(consumer.join().unwrap(), None);
}

#[test]
fn capacity_two_pipeline() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(2).unwrap());
    queue.push("A").unwrap();
    queue.push("B").unwrap();

    let delivered = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let delivered = Arc::clone(&delivered);
        thread::spawn(move || {
            queue.push("C").unwrap();
            delivered.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(SETTLE);
    assert!(!delivered.load(Ordering::SeqCst), "third push did not block");

    assert_eq!(queue.pop(), Some("A"));
    producer.join().unwrap();
    assert_eq!(queue.pop(), Some("B"));
    assert_eq!(queue.pop(), Some("C"));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(SETTLE);
    queue.shutdown();
    assert_eq!(consumer.join().unwrap(), None);
}

#[test]
fn shutdown_drain_yields_buffered_items_then_none() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(4).unwrap());
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.push(3).unwrap();
    queue.shutdown();

    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.pop(), Some(2));
    assert_eq!(queue.pop(), Some(3));
    for _ in 0..3 {
        assert_eq!(queue.pop(), None);
    }
    assert_eq!(queue.try_pop(), Err(TryPopError::Drained));
}

#[test]
fn pop_timeout_released_by_late_push() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(1).unwrap());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            queue.push(9u64).unwrap();
        })
    };

    assert_eq!(queue.pop_timeout(Duration::from_secs(5)), Ok(9));
    producer.join().unwrap();
}

#[test]
fn mpmc_conservation() {
    init_test_tracing();

    let queue = Arc::new(BoundedQueue::new(8).unwrap());
    let producers = 4usize;
    let consumers = 3usize;
    let items_per_producer = 250usize;
    let total = producers * items_per_producer;

    let mut producer_handles = Vec::new();
    for id in 0..producers {
        let queue = Arc::clone(&queue);
        producer_handles.push(thread::spawn(move || {
            for seq in 0..items_per_producer {
                queue.push((id, seq)).unwrap();
            }
        }));
    }

    let mut consumer_handles = Vec::new();
    for _ in 0..consumers {
        let queue = Arc::clone(&queue);
        consumer_handles.push(thread::spawn(move || {
            let mut received = Vec::new();
            while let Some(item) = queue.pop() {
                received.push(item);
            }
            received
        }));
    }

    for handle in producer_handles {
        handle.join().unwrap();
    }

    queue.shutdown();

    let mut all = Vec::with_capacity(total);
    for handle in consumer_handles {
        let received = handle.join().unwrap();

        // The queue is globally FIFO, so each consumer sees any single
        // producer's items in that producer's program order.
        let mut last_seq = vec![None::<usize>; producers];
        for &(id, seq) in &received {
            if let Some(prev) = last_seq[id] {
                assert!(prev < seq, "producer {id} reordered: {prev} before {seq}");
            }
            last_seq[id] = Some(seq);
        }

        all.extend(received);
    }

    // Every item delivered exactly once.
    assert_eq!(all.len(), total);
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total);
}
