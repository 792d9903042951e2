#![forbid(unsafe_code)]

//! Host-driven single-shot timers.
//!
//! [`TimerScheduler`] is the only source of delayed work in folio. It never
//! reads wall-clock time: the embedding host advances a [`DeterministicClock`]
//! explicitly, which keeps every animation reproducible in tests and lets the
//! same code run on `wasm32-unknown-unknown` where blocking is not allowed.
//!
//! # Invariants
//!
//! 1. A scheduled payload is delivered exactly once, at or after its deadline,
//!    unless it was cancelled first.
//! 2. [`cancel`](TimerScheduler::cancel) is idempotent and is safe to call
//!    after the timer already fired.
//! 3. Timers fire in deadline order; equal deadlines fire in scheduling order.
//! 4. While a timer fires, [`now`](TimerScheduler::now) equals its deadline,
//!    so a timer scheduled from the handler is measured from that deadline
//!    rather than from the end of the advance window.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use folio_core::timer::TimerScheduler;
//!
//! let mut timers = TimerScheduler::new();
//! let handle = timers.schedule(Duration::from_millis(100), "tick");
//!
//! let mut seen = Vec::new();
//! timers.advance(Duration::from_millis(250), |_, _, msg| seen.push(msg));
//! assert_eq!(seen, vec!["tick"]);
//! assert!(!timers.cancel(handle));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Monotonic clock controlled by the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Current monotonic time.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    /// Move the clock forward to `instant`. Never moves backwards.
    fn advance_to(&mut self, instant: Duration) {
        if instant > self.now {
            self.now = instant;
        }
    }
}

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw sequence number, unique per scheduler.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Single-shot delayed delivery of payloads of type `T`.
///
/// The "callback" of a timer is the handler passed to
/// [`advance`](Self::advance): it receives the scheduler itself, the fired
/// handle, and the payload given to [`schedule`](Self::schedule).
pub struct TimerScheduler<T> {
    clock: DeterministicClock,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), T>,
    deadlines: HashMap<u64, Duration>,
}

impl<T> Default for TimerScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerScheduler<T> {
    /// Create an empty scheduler whose clock starts at `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(DeterministicClock::new())
    }

    /// Create an empty scheduler driven by an existing clock.
    #[must_use]
    pub fn with_clock(clock: DeterministicClock) -> Self {
        Self {
            clock,
            next_seq: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current time on the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Schedule `payload` for delivery `delay` from now.
    pub fn schedule(&mut self, delay: Duration, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = self.clock.now().saturating_add(delay);
        self.queue.insert((deadline, seq), payload);
        self.deadlines.insert(seq, deadline);
        crate::trace!(timer = seq, deadline_ms = deadline.as_millis() as u64, "timer scheduled");
        TimerHandle(seq)
    }

    /// Cancel a pending timer.
    ///
    /// Returns `true` if the timer was pending. Cancelling a fired, already
    /// cancelled, or foreign handle is a no-op returning `false`.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => {
                self.queue.remove(&(deadline, handle.0));
                crate::trace!(timer = handle.0, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether `handle` is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Advance the clock by `dt`, firing every timer that becomes due.
    ///
    /// `on_fire` runs once per fired timer and may schedule or cancel other
    /// timers; newly scheduled timers that fall inside the window fire during
    /// the same call. Returns the number of timers fired.
    pub fn advance<F>(&mut self, dt: Duration, mut on_fire: F) -> usize
    where
        F: FnMut(&mut Self, TimerHandle, T),
    {
        let target = self.clock.now().saturating_add(dt);
        let span = crate::trace_span!("timer_advance", pending = self.queue.len());
        let _guard = span.enter();
        let mut fired = 0;
        while let Some((handle, payload)) = self.pop_due(target) {
            fired += 1;
            on_fire(self, handle, payload);
        }
        self.clock.advance_to(target);
        fired
    }

    /// Drop every pending timer without firing it.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    fn pop_due(&mut self, target: Duration) -> Option<(TimerHandle, T)> {
        let &(deadline, seq) = self.queue.keys().next()?;
        if deadline > target {
            return None;
        }
        let payload = self.queue.remove(&(deadline, seq))?;
        self.deadlines.remove(&seq);
        self.clock.advance_to(deadline);
        Some((TimerHandle(seq), payload))
    }
}

impl<T> fmt::Debug for TimerScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("now", &self.clock.now())
            .field("pending", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn fires_once_at_deadline() {
        let mut timers = TimerScheduler::new();
        timers.schedule(MS_100, 1u32);

        let mut seen = Vec::new();
        assert_eq!(timers.advance(Duration::from_millis(99), |_, _, v| seen.push(v)), 0);
        assert_eq!(timers.advance(Duration::from_millis(1), |_, _, v| seen.push(v)), 1);
        assert_eq!(timers.advance(Duration::from_secs(10), |_, _, v| seen.push(v)), 0);
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut timers = TimerScheduler::new();
        let h = timers.schedule(MS_100, ());
        assert!(timers.is_pending(h));
        assert!(timers.cancel(h));
        assert!(!timers.cancel(h));
        assert_eq!(timers.advance(Duration::from_secs(1), |_, _, _| {}), 0);
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut timers = TimerScheduler::new();
        let h = timers.schedule(MS_100, ());
        timers.advance(MS_100, |_, _, _| {});
        assert!(!timers.is_pending(h));
        assert!(!timers.cancel(h));
    }

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut timers = TimerScheduler::new();
        timers.schedule(Duration::from_millis(30), "c");
        timers.schedule(Duration::from_millis(10), "a");
        timers.schedule(Duration::from_millis(10), "b");

        let mut seen = Vec::new();
        timers.advance(Duration::from_millis(50), |_, _, v| seen.push(v));
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn handler_sees_deadline_as_now() {
        let mut timers = TimerScheduler::new();
        timers.schedule(MS_100, ());
        let mut at = Vec::new();
        timers.advance(Duration::from_secs(1), |t, _, _| at.push(t.now()));
        assert_eq!(at, vec![MS_100]);
        assert_eq!(timers.now(), Duration::from_secs(1));
    }

    #[test]
    fn rescheduling_from_handler_chains_within_window() {
        let mut timers = TimerScheduler::new();
        timers.schedule(MS_100, 0u32);

        let mut fired_at = Vec::new();
        let count = timers.advance(Duration::from_millis(350), |t, _, n| {
            fired_at.push(t.now());
            t.schedule(MS_100, n + 1);
        });
        assert_eq!(count, 3);
        assert_eq!(
            fired_at,
            vec![MS_100, Duration::from_millis(200), Duration::from_millis(300)]
        );
        assert_eq!(timers.next_deadline(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn clear_drops_everything() {
        let mut timers = TimerScheduler::new();
        timers.schedule(MS_100, ());
        timers.schedule(MS_100, ());
        timers.clear();
        assert_eq!(timers.pending(), 0);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn clock_saturates() {
        let mut clock = DeterministicClock::new();
        clock.advance(Duration::MAX);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::MAX);
    }
}
