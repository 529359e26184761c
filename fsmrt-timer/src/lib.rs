//! A kernel-backed periodic timer service for `fsmrt-core` runtimes.
//!
//! Each timer is a real Linux `timerfd`, created and read through the `nix`
//! crate exactly as `examples/original_source/timer.c` drives
//! `timerfd_create`/`timerfd_settime`/`timerfd_gettime`. A single service
//! thread multiplexes every live timer fd with the `polling` crate's
//! `Poller` and broadcasts each timer's configured event into a
//! [`fsmrt_core::Runtime`] when it fires.

mod error;
mod registry;
mod service;

pub use error::TimerError;
pub use registry::TimerId;
pub use service::{TimerService, TimerServiceConfig};
