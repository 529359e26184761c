//! The worker registry: the process-wide, ordered collection of live
//! workers and the single handle ([`Runtime`]) every thread uses to reach
//! it.
//!
//! Rendered from `original_source/workers.h`'s global intrusive list of
//! `worker_t` plus the `pthread_self()`-based self-lookup scattered through
//! `fsmdemo.c`'s action functions — replaced here with an `Arc`-shared
//! registry and a thread-local cache of "which `WorkerId` am I".

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::event::EventId;
use crate::fsm::{Fsm, TableFsm, Transition};
use crate::queue::EventQueue;
use crate::worker::{fsm_worker_loop, io_worker_loop, WorkerContext, WorkerId};

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Tunables for a [`Runtime`], analogous to the compile-time constants
/// `original_source/evtq.h` hard-codes (queue growth increment, max
/// workers).
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Log a warning the first time any worker's queue depth reaches this
    /// many pending events. `None` disables the check.
    pub queue_warn_depth: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { queue_warn_depth: Some(1024) }
    }
}

struct WorkerRecord<E: EventId> {
    id: WorkerId,
    name: &'static str,
    queue: Arc<EventQueue<E>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct RuntimeInner<E: EventId> {
    config: RuntimeConfig,
    workers: Mutex<Vec<Arc<WorkerRecord<E>>>>,
    by_name: Mutex<HashMap<&'static str, WorkerId>>,
    next_id: Mutex<usize>,
}

/// The single handle a program threads through every worker, action, and
/// guard. Cheap to clone (an `Arc` underneath); never a global singleton —
/// a program can run more than one independent [`Runtime`] if it wants to.
pub struct Runtime<E: EventId> {
    inner: Arc<RuntimeInner<E>>,
}

impl<E: EventId> Clone for Runtime<E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<E: EventId> std::fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("worker_count", &self.worker_count()).finish()
    }
}

impl<E: EventId> Runtime<E> {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                workers: Mutex::new(Vec::new()),
                by_name: Mutex::new(HashMap::new()),
                next_id: Mutex::new(0),
            }),
        }
    }

    /// A runtime with no workers registered, for constructing an
    /// [`crate::fsm::ActionCtx`]/[`crate::fsm::Fsm`] in isolation from a
    /// live thread pool.
    #[doc(hidden)]
    pub fn new_for_test() -> Self {
        Self::new()
    }

    fn allocate_id(&self) -> WorkerId {
        let mut next = self.inner.next_id.lock().unwrap_or_else(|e| e.into_inner());
        let id = WorkerId(*next);
        *next += 1;
        id
    }

    fn register(&self, name: &'static str, queue: Arc<EventQueue<E>>) -> Arc<WorkerRecord<E>> {
        let id = self.allocate_id();
        let record = Arc::new(WorkerRecord { id, name, queue, handle: Mutex::new(None) });
        self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()).push(record.clone());
        self.inner
            .by_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, id);
        record
    }

    /// Spawns a worker thread running an arbitrary entry function; the
    /// low-level primitive every other `spawn_*` method is built on.
    pub fn spawn_worker<F>(&self, name: &'static str, entry: F) -> WorkerId
    where
        F: FnOnce(WorkerContext<E>) + Send + 'static,
        E: 'static,
    {
        let queue = Arc::new(EventQueue::new());
        let record = self.register(name, queue.clone());
        let id = record.id;
        let runtime = self.clone();
        let ctx = WorkerContext { id, name, queue, runtime };

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                CURRENT_WORKER.with(|c| c.set(Some(id)));
                entry(ctx);
            })
            .expect("failed to spawn OS thread for worker");

        *record.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(join);
        id
    }

    /// Spawns a worker driving an [`Fsm`] through [`fsm_worker_loop`], the
    /// common case demonstrated by `fsmdemo.c`'s `fsm1_thread`/`fsm2_thread`.
    pub fn spawn_fsm_worker(&self, name: &'static str, fsm: impl Fsm<E> + 'static) -> WorkerId
    where
        E: 'static,
    {
        self.spawn_worker(name, move |ctx| fsm_worker_loop(ctx, fsm))
    }

    /// Builds and spawns a [`TableFsm`] worker in one call.
    pub fn spawn_table_fsm_worker(
        &self,
        name: &'static str,
        table: &'static [Transition<E>],
    ) -> WorkerId
    where
        E: 'static,
    {
        let fsm = TableFsm::new(self.clone(), table);
        self.spawn_fsm_worker(name, fsm)
    }

    /// Spawns a worker that reacts to events without an FSM in between, via
    /// [`io_worker_loop`].
    pub fn spawn_io_worker<F>(&self, name: &'static str, handle: F) -> WorkerId
    where
        F: FnMut(E, &Runtime<E>) + Send + 'static,
        E: 'static,
    {
        self.spawn_worker(name, move |ctx| io_worker_loop(ctx, handle))
    }

    pub fn find_by_id(&self, id: WorkerId) -> Option<Arc<EventQueue<E>>> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.queue.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<WorkerId> {
        self.inner
            .by_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }

    /// The calling thread's own [`WorkerId`], if it was spawned by this
    /// runtime. Replaces the `pthread_self()` linear scan over the worker
    /// list in `original_source/workers.h` with an O(1) thread-local read.
    pub fn self_id(&self) -> Option<WorkerId> {
        CURRENT_WORKER.with(|c| c.get())
    }

    /// Enqueues `event` onto every registered worker's queue, warning if a
    /// queue's depth crosses the configured threshold.
    pub fn broadcast(&self, event: E) {
        let records: Vec<_> = self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for record in records {
            let _ = record.queue.enqueue(event);
            if let Some(warn_depth) = self.inner.config.queue_warn_depth {
                let len = record.queue.len();
                if len >= warn_depth {
                    tracing::warn!(worker = %record.id, name = record.name, len, "queue depth at warn threshold");
                }
            }
        }
    }

    /// Sends `event` to a single worker's queue by id. Returns `false` if no
    /// such worker is registered.
    pub fn send_to(&self, id: WorkerId, event: E) -> bool {
        match self.find_by_id(id) {
            Some(queue) => {
                let _ = queue.enqueue(event);
                true
            }
            None => false,
        }
    }

    /// Blocks until every spawned worker's thread has returned. Safe to call
    /// more than once; a thread already joined is simply skipped.
    pub fn join_all(&self) {
        let records: Vec<_> = self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for record in records {
            let handle = record.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(handle) = handle {
                if let Err(panic) = handle.join() {
                    tracing::warn!(worker = %record.id, name = record.name, ?panic, "worker thread panicked");
                }
            }
        }
    }

    /// Broadcasts `DONE` to every worker and blocks until they've all
    /// exited. Idempotent: a second call broadcasts into already-drained
    /// queues and joins nothing (the handles are already taken).
    pub fn shutdown(&self) {
        self.broadcast(E::DONE);
        self.join_all();
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<E: EventId> Default for Runtime<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry/test_registry.rs"]
mod test_registry;
