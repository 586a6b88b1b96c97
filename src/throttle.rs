//! Leading-plus-trailing throttling for update coalescing.
//!
//! Streamed text arrives in bursts much faster than reparsing is worth
//! doing. A [`Throttle`] admits the first request in a window immediately
//! (leading edge) and coalesces everything after it into a single deferred
//! run (trailing edge) released by [`Throttle::poll`]. The throttle holds
//! no payload; callers keep the latest input themselves, so the last
//! request in a window always wins.
//!
//! Time is injected through the [`Clock`] trait so throttling behavior is
//! testable without real timers.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic time source, expressed as elapsed time since an arbitrary
/// per-clock origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct MockClock {
    now: Cell<Duration>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Coalescing throttle state. Timing decisions take the current time as an
/// argument; the clock itself lives with the owner.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last_run: Option<Duration>,
    pending: bool,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: None,
            pending: false,
        }
    }

    /// Registers a request. Returns true when the caller should run now
    /// (leading edge); otherwise the request is folded into the pending
    /// trailing run.
    pub fn request(&mut self, now: Duration) -> bool {
        match self.last_run {
            Some(last) if now < last + self.window => {
                self.pending = true;
                false
            }
            _ => {
                self.last_run = Some(now);
                self.pending = false;
                true
            }
        }
    }

    /// Releases the trailing run once the window has elapsed. Returns true
    /// at most once per coalesced burst.
    pub fn poll(&mut self, now: Duration) -> bool {
        if !self.pending {
            return false;
        }
        match self.last_run {
            Some(last) if now < last + self.window => false,
            _ => {
                self.last_run = Some(now);
                self.pending = false;
                true
            }
        }
    }

    /// True when a trailing run is still owed.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Forgets all state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.last_run = None;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn test_leading_edge_runs_immediately() {
        let clock = MockClock::new();
        let mut throttle = Throttle::new(WINDOW);
        assert!(throttle.request(clock.now()));
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_burst_coalesces_to_one_trailing_run() {
        let clock = MockClock::new();
        let mut throttle = Throttle::new(WINDOW);
        assert!(throttle.request(clock.now()));

        for _ in 0..5 {
            clock.advance(Duration::from_millis(10));
            assert!(!throttle.request(clock.now()));
        }
        assert!(throttle.is_pending());

        // Window not over yet.
        assert!(!throttle.poll(clock.now()));

        clock.advance(Duration::from_millis(100));
        assert!(throttle.poll(clock.now()));
        // Only one trailing run per burst.
        assert!(!throttle.poll(clock.now()));
    }

    #[test]
    fn test_request_after_window_is_leading_again() {
        let clock = MockClock::new();
        let mut throttle = Throttle::new(WINDOW);
        assert!(throttle.request(clock.now()));
        clock.advance(Duration::from_millis(150));
        assert!(throttle.request(clock.now()));
    }

    #[test]
    fn test_reset_forgets_window() {
        let clock = MockClock::new();
        let mut throttle = Throttle::new(WINDOW);
        assert!(throttle.request(clock.now()));
        assert!(!throttle.request(clock.now()));
        throttle.reset();
        assert!(throttle.request(clock.now()));
    }
}
