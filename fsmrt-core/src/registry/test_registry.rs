//! Unit tests for [`super::Runtime`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Runtime, RuntimeConfig};
use crate::event::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TestEvent {
    Init,
    Done,
    Ping,
}

impl EventId for TestEvent {
    const INIT: Self = TestEvent::Init;
    const DONE: Self = TestEvent::Done;
}

#[test]
fn spawned_worker_is_findable_by_name_and_id() {
    let runtime = Runtime::<TestEvent>::new();
    let id = runtime.spawn_io_worker("pinger", |_event, _runtime| {});
    assert_eq!(runtime.find_by_name("pinger"), Some(id));
    assert!(runtime.find_by_id(id).is_some());
    runtime.shutdown();
}

#[test]
fn broadcast_reaches_every_worker() {
    let runtime = Runtime::<TestEvent>::new();
    let counter_a = Arc::new(AtomicU32::new(0));
    let counter_b = Arc::new(AtomicU32::new(0));

    {
        let counter_a = counter_a.clone();
        runtime.spawn_io_worker("a", move |event, _runtime| {
            if event == TestEvent::Ping {
                counter_a.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
    {
        let counter_b = counter_b.clone();
        runtime.spawn_io_worker("b", move |event, _runtime| {
            if event == TestEvent::Ping {
                counter_b.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    runtime.broadcast(TestEvent::Ping);
    // Give both workers a chance to observe the event before shutdown races
    // the DONE broadcast past it.
    std::thread::sleep(Duration::from_millis(50));
    runtime.shutdown();

    assert_eq!(counter_a.load(Ordering::SeqCst), 1);
    assert_eq!(counter_b.load(Ordering::SeqCst), 1);
}

#[test]
fn self_id_resolves_from_inside_the_spawned_thread() {
    let runtime = Runtime::<TestEvent>::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let id = runtime.spawn_io_worker("self_aware", move |event, runtime| {
        if event == TestEvent::Ping {
            let _ = tx.send(runtime.self_id());
        }
    });

    runtime.broadcast(TestEvent::Ping);
    let observed = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(observed, Some(id));
    runtime.shutdown();
}

#[test]
fn shutdown_is_idempotent() {
    let runtime = Runtime::<TestEvent>::new();
    runtime.spawn_io_worker("solo", |_event, _runtime| {});
    runtime.shutdown();
    runtime.shutdown();
}

#[test]
fn send_to_targets_a_single_worker() {
    let runtime = Runtime::<TestEvent>::new();
    let hits = Arc::new(AtomicU32::new(0));
    let missed = Arc::new(AtomicU32::new(0));

    let target = {
        let hits = hits.clone();
        runtime.spawn_io_worker("target", move |event, _runtime| {
            if event == TestEvent::Ping {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        })
    };
    {
        let missed = missed.clone();
        runtime.spawn_io_worker("bystander", move |event, _runtime| {
            if event == TestEvent::Ping {
                missed.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    assert!(runtime.send_to(target, TestEvent::Ping));
    std::thread::sleep(Duration::from_millis(50));
    runtime.shutdown();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(missed.load(Ordering::SeqCst), 0);
}

#[test]
fn runtime_config_is_honored() {
    let runtime = Runtime::<TestEvent>::with_config(RuntimeConfig { queue_warn_depth: None });
    let id = runtime.spawn_io_worker("quiet", |_event, _runtime| {
        std::thread::sleep(Duration::from_millis(200));
    });
    for _ in 0..10 {
        runtime.send_to(id, TestEvent::Ping);
    }
    runtime.shutdown();
}
