//! Event queue, worker registry, and FSM interpreter for building
//! multi-threaded, event-driven state machine runtimes.
//!
//! A program built on this crate chooses its own event set by implementing
//! [`event::EventId`], builds one or more [`fsm::TableFsm`] transition
//! tables, and spawns them as workers on a [`registry::Runtime`]. Workers
//! communicate exclusively by enqueuing events into each other's queues or
//! by broadcasting through the runtime; there is no shared mutable state
//! beyond what an action explicitly reaches for through its
//! [`fsm::ActionCtx`].

pub mod event;
pub mod fsm;
pub mod queue;
pub mod registry;
pub mod worker;

pub use event::EventId;
pub use fsm::{Action, ActionCtx, Fsm, Guard, Outcome, State, TableFsm, Transition};
pub use queue::{EventQueue, QueueError};
pub use registry::{Runtime, RuntimeConfig};
pub use worker::{fsm_worker_loop, io_worker_loop, WorkerContext, WorkerId};
