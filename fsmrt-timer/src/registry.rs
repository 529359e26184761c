//! The timer id trait and the internal table of live timers, mirroring
//! `examples/original_source/timer.h`'s `fsmtimer_t` list plus
//! `find_timer_by_id`/`find_timer_by_pollfd`.

use std::fmt::Debug;
use std::hash::Hash;

use nix::sys::timerfd::TimerFd;

/// A caller-chosen, closed set of timer identifiers. Generic rather than
/// hardcoded (the C source's `enum timer_ids { TID_LIGHT, TID_BLINK }`), to
/// match genericizing the runtime over `fsmrt_core::EventId`.
pub trait TimerId: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T: Copy + Eq + Hash + Debug + Send + Sync + 'static> TimerId for T {}

/// One live timer: its kernel file descriptor, the event it broadcasts on
/// expiry, its current period, and the period it held before the most
/// recent `set` — the latter is what `toggle` restores to.
pub(crate) struct TimerEntry<T, E> {
    pub(crate) id: T,
    pub(crate) fd: TimerFd,
    pub(crate) event: E,
    pub(crate) current_period: std::time::Duration,
    pub(crate) previous_period: std::time::Duration,
}
