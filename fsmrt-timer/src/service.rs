//! The timer service thread: the Rust rendering of
//! `examples/original_source/timer.c`'s `timer_service_fn` (declared but
//! never defined in the original; its shape is inferred from the
//! `epoll_wait`-based producer loop in `evtdemo.c` and from the `TimerThread`
//! wrapper pattern other example repos use for background polling threads).

use std::collections::HashMap;
use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use nix::unistd::read;
use polling::{Event, Events, PollMode, Poller};

use fsmrt_core::{EventId, Runtime};

use crate::error::TimerError;
use crate::registry::{TimerEntry, TimerId};

/// Tunables for a [`TimerService`]. Defaults to the 200 ms poll period the
/// runtime uses so newly armed timers are picked up promptly and
/// cancellation responds within one poll period.
#[derive(Debug, Clone, Copy)]
pub struct TimerServiceConfig {
    pub poll_timeout: Duration,
}

impl Default for TimerServiceConfig {
    fn default() -> Self {
        Self { poll_timeout: Duration::from_millis(200) }
    }
}

struct Shared<T: TimerId, E: EventId> {
    runtime: Runtime<E>,
    config: TimerServiceConfig,
    poller: Poller,
    timers: Mutex<HashMap<T, TimerEntry<T, E>>>,
    keys: Mutex<HashMap<usize, T>>,
    next_key: AtomicUsize,
    shutdown: AtomicBool,
}

/// A running timer service: a background thread plus the registry of
/// kernel timers it multiplexes.
pub struct TimerService<T: TimerId, E: EventId> {
    shared: Arc<Shared<T, E>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T: TimerId, E: EventId> std::fmt::Debug for TimerService<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner()).len();
        f.debug_struct("TimerService").field("timer_count", &len).finish()
    }
}

impl<T: TimerId, E: EventId> TimerService<T, E> {
    pub fn new(runtime: Runtime<E>) -> Self {
        Self::with_config(runtime, TimerServiceConfig::default())
    }

    pub fn with_config(runtime: Runtime<E>, config: TimerServiceConfig) -> Self {
        let shared = Arc::new(Shared {
            runtime,
            config,
            poller: Poller::new().expect("failed to create readiness poller"),
            timers: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashMap::new()),
            next_key: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let loop_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("timer-service".to_string())
            .spawn(move || poll_loop(loop_shared))
            .expect("failed to spawn OS thread for timer service");

        Self { shared, thread: Mutex::new(Some(thread)) }
    }

    /// Creates a new, disarmed timer that will broadcast `event` through the
    /// service's runtime when it fires. Fails if `id` already exists.
    pub fn create(&self, id: T, event: E) -> Result<(), TimerError> {
        let mut timers = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        if timers.contains_key(&id) {
            return Err(TimerError::DuplicateTimer(format!("{id:?}")));
        }

        let fd = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::empty())
            .expect("timerfd_create failed");

        let key = self.shared.next_key.fetch_add(1, Ordering::SeqCst);
        // SAFETY: the fd stays registered with the poller for as long as it
        // remains in `timers`, and is removed before being dropped in
        // `destroy`/`Drop`.
        unsafe {
            self.shared
                .poller
                .add_with_mode(&fd.as_fd(), Event::readable(key), PollMode::Level)
                .expect("failed to register timerfd with poller");
        }

        self.shared.keys.lock().unwrap_or_else(|e| e.into_inner()).insert(key, id);
        timers.insert(
            id,
            TimerEntry {
                id,
                fd,
                event,
                current_period: Duration::ZERO,
                previous_period: Duration::ZERO,
            },
        );
        Ok(())
    }

    /// Arms `id` to fire periodically every `period` (or disarms it, for
    /// `Duration::ZERO`), saving the period it held before this call so
    /// `toggle` can restore it.
    pub fn set(&self, id: T, period: Duration) {
        let mut timers = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = timers.get_mut(&id).expect("set_timer called on unknown timer id");
        entry.previous_period = entry.current_period;
        arm(entry, period);
    }

    /// Disarms `id` without forgetting its period; equivalent to
    /// `set(id, Duration::ZERO)`.
    pub fn stop(&self, id: T) {
        self.set(id, Duration::ZERO);
    }

    /// If `id` is currently armed, disarms it (saving its period for the
    /// next `toggle`); otherwise restores it to the period it last held.
    /// Returns the resulting armed state.
    pub fn toggle(&self, id: T) -> bool {
        let mut timers = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = timers.get_mut(&id).expect("toggle_timer called on unknown timer id");
        let next_period =
            if entry.current_period.is_zero() { entry.previous_period } else { Duration::ZERO };
        entry.previous_period = entry.current_period;
        arm(entry, next_period);
        !entry.current_period.is_zero()
    }

    /// Time remaining before `id`'s next expiry.
    pub fn get(&self, id: T) -> Duration {
        let timers = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = timers.get(&id).expect("get_timer called on unknown timer id");
        match entry.fd.get().expect("timerfd_gettime failed") {
            Some(expiration) => duration_from_expiration(&expiration),
            None => Duration::ZERO,
        }
    }

    /// Stops the service thread and closes every timer's file descriptor.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.poller.notify().expect("failed to wake timer service poller");
        if let Some(thread) = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = thread.join();
        }
        let mut timers = self.shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        // Deregister every fd from the poller before dropping it: the
        // `add_with_mode` call in `create` requires the source stay
        // registered for as long as the fd is alive.
        for entry in timers.values() {
            let _ = self.shared.poller.delete(entry.fd.as_fd());
        }
        timers.clear();
    }
}

fn arm<T: TimerId, E: EventId>(entry: &mut TimerEntry<T, E>, period: Duration) {
    let period_spec = timespec_from_duration(period);
    let expiration = if period.is_zero() {
        Expiration::OneShot(TimeSpec::new(0, 0))
    } else {
        Expiration::IntervalDelayed(period_spec, period_spec)
    };
    entry
        .fd
        .set(expiration, TimerSetTimeFlags::empty())
        .expect("timerfd_settime failed");
    entry.current_period = period;
}

fn timespec_from_duration(d: Duration) -> TimeSpec {
    TimeSpec::new(d.as_secs() as i64, d.subsec_nanos() as i64)
}

fn duration_from_expiration(expiration: &Expiration) -> Duration {
    let spec = match expiration {
        Expiration::OneShot(ts) => *ts,
        Expiration::IntervalDelayed(ts, _) => *ts,
        Expiration::Interval(ts) => *ts,
    };
    Duration::new(spec.tv_sec().max(0) as u64, spec.tv_nsec().max(0) as u32)
}

fn poll_loop<T: TimerId, E: EventId>(shared: Arc<Shared<T, E>>) {
    let mut events = Events::new();
    tracing::debug!("timer service starting");

    while !shared.shutdown.load(Ordering::Acquire) {
        events.clear();
        let timeout = Some(shared.config.poll_timeout);
        match shared.poller.wait(&mut events, timeout) {
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(?err, "timer service poll failed, retrying");
                continue;
            }
        }

        for event in events.iter() {
            let id = {
                let keys = shared.keys.lock().unwrap_or_else(|e| e.into_inner());
                match keys.get(&event.key) {
                    Some(id) => *id,
                    None => continue,
                }
            };
            handle_expiry(&shared, id);
        }
    }

    tracing::debug!("timer service stopped");
}

fn handle_expiry<T: TimerId, E: EventId>(shared: &Shared<T, E>, id: T) {
    let (count, event) = {
        let timers = shared.timers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = timers.get(&id) else { return };
        // A timerfd read either returns the full 8-byte expiration counter
        // or fails with EAGAIN; there's no such thing as a short read here.
        // Draining it is what clears the fd's readiness, so under
        // PollMode::Level this is also what keeps the poller from
        // re-reporting the same fd on every subsequent wait().
        let mut buf = [0u8; 8];
        let n = read(entry.fd.as_fd().as_raw_fd(), &mut buf).expect("timerfd read failed");
        assert_eq!(n, 8, "timerfd read returned {n} bytes, expected 8");
        let count = u64::from_ne_bytes(buf);
        (count, entry.event)
    };

    if count > 1 {
        tracing::warn!(timer = ?id, count, "timer expirations coalesced");
    }
    shared.runtime.broadcast(event);
}
