//! Worker threads: the loop that dequeues events and drives an [`Fsm`].
//!
//! Rendered from `original_source/workers.h`'s `worker_t` plus the
//! `fsm1_thread`/`fsm2_thread` loops in `fsmdemo.c`: init, then repeatedly
//! dequeue-and-step until the FSM asks to stop or the sentinel `DONE` event
//! arrives.

use crate::event::EventId;
use crate::fsm::Fsm;
use crate::queue::EventQueue;
use crate::registry::Runtime;

/// A stable, process-unique handle to a registered worker. Replaces the
/// intrusive `worker_t *` pointers of `original_source/workers.h` with a
/// plain value that outlives any particular thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) usize);

impl WorkerId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// What a worker's entry function needs: its own identity, its queue, and a
/// handle back into the runtime for broadcasting and lookups.
pub struct WorkerContext<E: EventId> {
    pub id: WorkerId,
    pub name: &'static str,
    pub queue: std::sync::Arc<EventQueue<E>>,
    pub runtime: Runtime<E>,
}

impl<E: EventId> std::fmt::Debug for WorkerContext<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<E: EventId> WorkerContext<E> {
    /// Blocks until the next event destined for this worker arrives.
    pub fn dequeue(&self) -> E {
        self.queue.dequeue()
    }
}

/// The canonical FSM-driving loop: run `fsm.init`, then repeatedly dequeue
/// and `fsm.step` until the FSM requests exit, mirroring the exit flag set
/// from inside an action that in `original_source/fsm_defs.h` would have
/// called `pthread_exit` directly.
pub fn fsm_worker_loop<E: EventId>(ctx: WorkerContext<E>, mut fsm: impl Fsm<E>) {
    tracing::debug!(worker = %ctx.id, name = ctx.name, "worker starting");
    fsm.init(&ctx.runtime);

    loop {
        let event = ctx.dequeue();
        let _outcome = fsm.step(event, &ctx.runtime);
        if fsm.exit_requested() {
            tracing::debug!(worker = %ctx.id, "worker exiting: fsm requested exit");
            break;
        }
    }
}

/// A simpler loop for workers that aren't driving an FSM at all (pure I/O or
/// producer workers): it exits as soon as the sentinel `DONE` event is
/// dequeued, with no interpreter in between.
pub fn io_worker_loop<E: EventId>(ctx: WorkerContext<E>, mut handle: impl FnMut(E, &Runtime<E>)) {
    tracing::debug!(worker = %ctx.id, name = ctx.name, "worker starting");
    loop {
        let event = ctx.dequeue();
        if event == E::DONE {
            tracing::debug!(worker = %ctx.id, "worker exiting: DONE received");
            break;
        }
        handle(event, &ctx.runtime);
    }
}

#[cfg(test)]
#[path = "worker/test_worker.rs"]
mod test_worker;
