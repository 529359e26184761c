//! The FSM interpreter.
//!
//! A pure table-driven engine: given a current state and an incoming event,
//! it computes the next state, evaluates an optional guard, and fires
//! exit/entry actions. Stateless between invocations except for the
//! current-state pointer inside its context — the Rust rendering of
//! `original_source/fsm.c`'s `next_state`/`fsm_run` and `fsm.h`'s
//! `fsm_state_t`/`fsm_trans_t`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::EventId;
use crate::registry::Runtime;

/// An entry or exit action attached to a [`State`]. Actions are invoked
/// synchronously on the worker thread.
pub type Action<E> = fn(&ActionCtx<E>);

/// A side-effect-free predicate guarding a [`Transition`].
pub type Guard<E> = fn(&ActionCtx<E>) -> bool;

/// Immutable, `'static` state metadata.
#[derive(Debug)]
pub struct State<E: EventId> {
    pub name: &'static str,
    pub entry: Option<Action<E>>,
    pub exit: Option<Action<E>>,
}

impl<E: EventId> State<E> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, entry: None, exit: None }
    }

    pub const fn with_entry(mut self, action: Action<E>) -> Self {
        self.entry = Some(action);
        self
    }

    pub const fn with_exit(mut self, action: Action<E>) -> Self {
        self.exit = Some(action);
        self
    }
}

/// A row in the FSM table: `(from_state, event, optional_guard, to_state)`.
/// The table is an ordered sequence; the first matching `(from_state,
/// event)` wins.
#[derive(Debug)]
pub struct Transition<E: EventId> {
    pub from: &'static State<E>,
    pub event: E,
    pub guard: Option<Guard<E>>,
    pub to: &'static State<E>,
}

/// The result of a single [`Fsm::step`]. No outcome is fatal; the caller
/// decides whether to log or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Transitioned,
    GuardFailed,
    NoMatch,
}

/// The capability handle passed to every action and guard: an opaque
/// pointer to the current state's metadata, plus a [`Runtime`] handle so
/// actions can broadcast events and arm timers.
pub struct ActionCtx<E: EventId> {
    pub runtime: Runtime<E>,
    pub state_name: &'static str,
    exit_requested: AtomicBool,
}

impl<E: EventId> std::fmt::Debug for ActionCtx<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCtx")
            .field("state_name", &self.state_name)
            .field("exit_requested", &self.exit_requested.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<E: EventId> ActionCtx<E> {
    pub(crate) fn new(runtime: Runtime<E>, state_name: &'static str) -> Self {
        Self { runtime, state_name, exit_requested: AtomicBool::new(false) }
    }

    /// Declares that, once the current [`Fsm::step`] call returns, the
    /// owning worker's dequeue loop should exit cooperatively. This is the
    /// safe-Rust rendering of the terminal-state action calling
    /// `pthread_exit` in `original_source/fsm_defs.h`'s `act_done`.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Release);
    }

    pub(crate) fn exit_was_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }

    fn reset_exit_request(&self) {
        self.exit_requested.store(false, Ordering::Release);
    }

    fn set_state_name(&mut self, name: &'static str) {
        self.state_name = name;
    }
}

/// An FSM that can be driven by a worker's dequeue loop without the worker
/// knowing its concrete state/context type.
pub trait Fsm<E: EventId>: Send {
    /// Runs the initial state's entry action. Called once per worker before
    /// its dequeue loop begins.
    fn init(&mut self, runtime: &Runtime<E>);

    /// Runs a single step of the interpreter algorithm.
    fn step(&mut self, event: E, runtime: &Runtime<E>) -> Outcome;

    /// Set after `step` if the FSM wants its worker's dequeue loop to exit
    /// cooperatively.
    fn exit_requested(&self) -> bool;
}

/// The concrete, table-driven [`Fsm`] implementation.
pub struct TableFsm<E: EventId> {
    table: &'static [Transition<E>],
    current: &'static State<E>,
    action_ctx: ActionCtx<E>,
}

impl<E: EventId> std::fmt::Debug for TableFsm<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableFsm").field("current", &self.current.name).finish_non_exhaustive()
    }
}

impl<E: EventId> TableFsm<E> {
    /// Builds a context whose initial state is the `from_state` of the
    /// table's first transition.
    pub fn new(runtime: Runtime<E>, table: &'static [Transition<E>]) -> Self {
        let initial = table.first().expect("FSM transition table must not be empty").from;
        Self { table, current: initial, action_ctx: ActionCtx::new(runtime, initial.name) }
    }

    pub fn current_state_name(&self) -> &'static str {
        self.current.name
    }

    fn run_entry(&mut self) {
        self.action_ctx.set_state_name(self.current.name);
        if let Some(entry) = self.current.entry {
            entry(&self.action_ctx);
        }
    }

    /// Scans the table in order for the first `(current, event)` match, the
    /// Rust rendering of `original_source/fsm.c`'s `next_state`.
    fn find_transition(&self, event: E) -> Option<&'static Transition<E>> {
        self.table
            .iter()
            .find(|t| std::ptr::eq(t.from, self.current) && t.event == event)
    }
}

impl<E: EventId> Fsm<E> for TableFsm<E> {
    fn init(&mut self, _runtime: &Runtime<E>) {
        tracing::debug!(state = self.current.name, "fsm_init");
        self.run_entry();
    }

    fn step(&mut self, event: E, _runtime: &Runtime<E>) -> Outcome {
        self.action_ctx.reset_exit_request();

        let Some(transition) = self.find_transition(event) else {
            tracing::debug!(state = self.current.name, ?event, "fsm_run: NoMatch");
            return Outcome::NoMatch;
        };

        if let Some(guard) = transition.guard {
            self.action_ctx.set_state_name(self.current.name);
            if !guard(&self.action_ctx) {
                tracing::debug!(state = self.current.name, ?event, "fsm_run: GuardFailed");
                return Outcome::GuardFailed;
            }
        }

        tracing::debug!(
            from = self.current.name,
            to = transition.to.name,
            ?event,
            "fsm_run: Transitioned"
        );

        self.action_ctx.set_state_name(self.current.name);
        if let Some(exit) = self.current.exit {
            exit(&self.action_ctx);
        }

        self.current = transition.to;
        self.run_entry();

        Outcome::Transitioned
    }

    fn exit_requested(&self) -> bool {
        self.action_ctx.exit_was_requested()
    }
}
