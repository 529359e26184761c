//! Unit tests for the worker loop functions, exercised indirectly through
//! [`crate::registry::Runtime::spawn_fsm_worker`] since the loops themselves
//! take ownership of a [`WorkerContext`] that only a [`Runtime`] can build.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::event::EventId;
use crate::fsm::{ActionCtx, State, TableFsm, Transition};
use crate::registry::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TestEvent {
    Init,
    Done,
    Advance,
}

impl EventId for TestEvent {
    const INIT: Self = TestEvent::Init;
    const DONE: Self = TestEvent::Done;
}

static STEPS: AtomicU32 = AtomicU32::new(0);

fn bump(_ctx: &ActionCtx<TestEvent>) {
    STEPS.fetch_add(1, Ordering::SeqCst);
}

fn quit(ctx: &ActionCtx<TestEvent>) {
    ctx.request_exit();
}

static RUNNING: State<TestEvent> = State::new("running").with_entry(bump);
static DONE_STATE: State<TestEvent> = State::new("done").with_entry(quit);

static TABLE: [Transition<TestEvent>; 1] = [Transition {
    from: &RUNNING,
    event: TestEvent::Advance,
    guard: None,
    to: &DONE_STATE,
}];

#[test]
fn worker_loop_exits_after_fsm_requests_exit() {
    STEPS.store(0, Ordering::SeqCst);
    let runtime = Runtime::<TestEvent>::new();
    let fsm = TableFsm::new(runtime.clone(), &TABLE);
    let id = runtime.spawn_fsm_worker("advancer", fsm);

    runtime.send_to(id, TestEvent::Advance);
    runtime.join_all();

    assert_eq!(STEPS.load(Ordering::SeqCst), 1, "running's entry runs exactly once at init");
}

#[test]
fn worker_loop_tolerates_no_match_events_without_exiting() {
    STEPS.store(0, Ordering::SeqCst);
    let runtime = Runtime::<TestEvent>::new();
    let fsm = TableFsm::new(runtime.clone(), &TABLE);
    let id = runtime.spawn_fsm_worker("advancer", fsm);

    // Init events with no matching row must not stop the worker.
    runtime.send_to(id, TestEvent::Init);
    runtime.send_to(id, TestEvent::Init);
    std::thread::sleep(Duration::from_millis(50));
    runtime.send_to(id, TestEvent::Advance);
    runtime.join_all();
}
