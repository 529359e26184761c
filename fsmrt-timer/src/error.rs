//! Recoverable error conditions for the timer service.

/// The one caller-recoverable precondition failure in this crate; every
/// other fault (an unknown timer id, a `timerfd`/poller syscall failure) is
/// treated as fatal-by-design and surfaces as a panic with a descriptive
/// message instead.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("timer {0:?} already exists")]
    DuplicateTimer(String),
}
