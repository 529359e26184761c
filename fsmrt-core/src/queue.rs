//! The event queue.
//!
//! A bounded-in-practice, unbounded-in-policy FIFO of event identifiers,
//! guarded by a mutex and signaled by a condition variable — the Rust
//! rendering of `original_source/evtq.c`'s `pthread_mutex_t` +
//! `pthread_cond_t` pair around an intrusive linked list.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::event::EventId;

/// The one fallible operation on a queue: allocation failure on enqueue.
/// Every other queue operation (`dequeue`, `len`) cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to grow event queue to accept another event")]
    AllocationFailed,
}

struct QueueState<E: EventId> {
    items: VecDeque<E>,
}

/// A FIFO event queue, owned by exactly one worker for dequeue purposes but
/// enqueued into from any thread.
pub struct EventQueue<E: EventId> {
    state: Mutex<QueueState<E>>,
    not_empty: Condvar,
}

impl<E: EventId> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventId> EventQueue<E> {
    /// Creates an empty queue ready for use from any thread.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState { items: VecDeque::new() }),
            not_empty: Condvar::new(),
        }
    }

    /// Appends `event` at the tail, wakes exactly one waiter, and yields the
    /// calling thread as a fairness hint — never blocks.
    pub fn enqueue(&self, event: E) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .items
            .try_reserve(1)
            .map_err(|_| QueueError::AllocationFailed)?;
        state.items.push_back(event);
        tracing::trace!(?event, "enqueue");
        // Wake one waiter, not all: evtq_enqueue calls pthread_cond_signal,
        // not pthread_cond_broadcast.
        self.not_empty.notify_one();
        drop(state);
        // Fairness hint, not a correctness requirement: give a woken
        // dequeuer a chance to run before this thread enqueues again.
        std::thread::yield_now();
        Ok(())
    }

    /// Blocks until an event is available, then removes and returns the
    /// head. Tolerates spurious wakeups by re-checking length under the
    /// lock.
    pub fn dequeue(&self) -> E {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state = self
            .not_empty
            .wait_while(state, |s| s.items.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        let event = state.items.pop_front().expect("woken with non-empty queue");
        tracing::trace!(?event, "dequeue");
        event
    }

    /// Snapshot length; meaningful only as a lower bound for other threads.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).items.len()
    }

    /// Whether the queue was empty at the moment of the snapshot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: EventId> std::fmt::Debug for EventQueue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
#[path = "queue/test_queue.rs"]
mod test_queue;
