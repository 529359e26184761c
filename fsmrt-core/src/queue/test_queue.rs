//! Unit tests for [`super::EventQueue`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use super::EventQueue;
use crate::event::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TestEvent {
    Init,
    Done,
    Tagged(u32),
}

impl EventId for TestEvent {
    const INIT: Self = TestEvent::Init;
    const DONE: Self = TestEvent::Done;
}

#[test]
fn fifo_order_is_preserved_for_a_single_producer() {
    let q = EventQueue::<TestEvent>::new();
    for i in 0..16 {
        q.enqueue(TestEvent::Tagged(i)).unwrap();
    }
    for i in 0..16 {
        assert_eq!(q.dequeue(), TestEvent::Tagged(i));
    }
}

#[test]
fn dequeue_on_empty_queue_blocks_until_enqueue() {
    let q = Arc::new(EventQueue::<TestEvent>::new());
    let reader = {
        let q = q.clone();
        thread::spawn(move || q.dequeue())
    };

    // Give the reader thread every chance to park in dequeue() first.
    thread::sleep(Duration::from_millis(50));
    assert!(!reader.is_finished());

    q.enqueue(TestEvent::Tagged(7)).unwrap();
    assert_eq!(reader.join().unwrap(), TestEvent::Tagged(7));
}

#[test]
fn len_reflects_pending_events() {
    let q = EventQueue::<TestEvent>::new();
    assert_eq!(q.len(), 0);
    assert!(q.is_empty());
    q.enqueue(TestEvent::Tagged(1)).unwrap();
    q.enqueue(TestEvent::Tagged(2)).unwrap();
    assert_eq!(q.len(), 2);
    q.dequeue();
    assert_eq!(q.len(), 1);
}

#[test]
fn n_concurrent_enqueuers_all_land_exactly_once() {
    const PRODUCERS: u32 = 8;
    const PER_PRODUCER: u32 = 200;

    let q = Arc::new(EventQueue::<TestEvent>::new());
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    q.enqueue(TestEvent::Tagged(p * PER_PRODUCER + i)).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut seen = vec![false; (PRODUCERS * PER_PRODUCER) as usize];
    for _ in 0..(PRODUCERS * PER_PRODUCER) {
        match q.dequeue() {
            TestEvent::Tagged(tag) => {
                assert!(!seen[tag as usize], "tag {tag} dequeued twice");
                seen[tag as usize] = true;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(seen.into_iter().all(|s| s), "every tag must be dequeued exactly once");
    assert!(q.is_empty());
}

proptest! {
    /// For every sequence of enqueues from a single thread, the sequence of
    /// dequeues equals it exactly.
    #[test]
    fn fifo_holds_for_arbitrary_sequences(tags in proptest::collection::vec(0u32..1000, 0..200)) {
        let q = EventQueue::<TestEvent>::new();
        for &t in &tags {
            q.enqueue(TestEvent::Tagged(t)).unwrap();
        }
        for &t in &tags {
            prop_assert_eq!(q.dequeue(), TestEvent::Tagged(t));
        }
    }
}
