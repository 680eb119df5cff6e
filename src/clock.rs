// clock.rs

use std::{cell::Cell, time::Instant};

use crate::*;

/// Monotonic time source, measured from boot.
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
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
        self.start.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Remembers when something last happened and answers whether a period
/// has passed since. An interval that was never marked is always due.
#[derive(Clone, Copy, Debug)]
pub struct Interval {
    period: Duration,
    last: Option<Duration>,
}

impl Interval {
    pub const fn new(period: Duration) -> Self {
        Interval { period, last: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last(&self) -> Option<Duration> {
        self.last
    }

    pub fn mark(&mut self, now: Duration) {
        self.last = Some(now);
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn elapsed(&self, now: Duration) -> Option<Duration> {
        self.last.map(|last| now.saturating_sub(last))
    }

    /// At least one full period has passed.
    pub fn reached(&self, now: Duration) -> bool {
        self.elapsed(now).map_or(true, |e| e >= self.period)
    }

    /// Strictly more than one period has passed.
    pub fn exceeded(&self, now: Duration) -> bool {
        self.elapsed(now).map_or(true, |e| e > self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_edges() {
        let mut iv = Interval::new(Duration::from_secs(10));
        assert!(iv.reached(Duration::ZERO));
        assert!(iv.exceeded(Duration::ZERO));

        iv.mark(Duration::from_secs(5));
        assert!(!iv.reached(Duration::from_millis(14_999)));
        assert!(iv.reached(Duration::from_secs(15)));
        assert!(!iv.exceeded(Duration::from_secs(15)));
        assert!(iv.exceeded(Duration::from_millis(15_001)));

        iv.clear();
        assert!(iv.reached(Duration::from_secs(6)));
    }

    #[test]
    fn time_going_backwards_is_not_elapsed() {
        let mut iv = Interval::new(Duration::from_secs(1));
        iv.mark(Duration::from_secs(100));
        assert_eq!(iv.elapsed(Duration::from_secs(50)), Some(Duration::ZERO));
        assert!(!iv.reached(Duration::from_secs(50)));
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(1500));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_secs(2));
        clock.set(Duration::from_secs(7));
        assert_eq!(clock.now(), Duration::from_secs(7));
    }
}

// EOF
