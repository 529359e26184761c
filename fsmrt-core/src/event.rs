//! Event identifiers.

use std::fmt::Debug;
use std::hash::Hash;

/// A closed, compile-time-known set of event tags.
///
/// Events are value types carrying no payload beyond their tag. Every
/// implementing set must supply the two sentinels every FSM runtime
/// transition table is built around: `INIT` (FSM startup) and `DONE`
/// (cooperative shutdown). `TIMER`-family events are not part of this
/// trait — they're ordinary variants a timer service is configured to
/// broadcast.
pub trait EventId: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Fired once into every worker to run FSMs out of their initial state.
    const INIT: Self;
    /// Fired to request cooperative shutdown of every worker.
    const DONE: Self;
}
