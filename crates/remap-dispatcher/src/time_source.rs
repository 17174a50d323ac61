//! Clocks consulted by the dispatcher when deciding whether timed work is due.

use std::{
    fmt,
    ops::{Add, AddAssign},
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// An instant on a [`TimeSource`] timeline, measured from that source's epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(Duration);

impl TimePoint {
    /// The epoch of the timeline.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Build a time point `since_epoch` after the epoch.
    #[must_use]
    pub const fn from_duration(since_epoch: Duration) -> Self {
        Self(since_epoch)
    }

    /// Build a time point `ms` milliseconds after the epoch.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    /// Distance from the epoch.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for TimePoint {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Duration> for TimePoint {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0.as_millis())
    }
}

/// Source of "now" for a dispatcher.
pub trait TimeSource: Send + Sync {
    /// Current reading of the clock.
    fn now(&self) -> TimePoint;
}

/// Anchor shared by every hardware source so their readings are comparable.
static HARDWARE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareTimeSource;

impl HardwareTimeSource {
    /// Create a hardware clock.
    #[must_use]
    pub fn new() -> Self {
        Lazy::force(&HARDWARE_EPOCH);
        Self
    }
}

impl TimeSource for HardwareTimeSource {
    fn now(&self) -> TimePoint {
        TimePoint(HARDWARE_EPOCH.elapsed())
    }
}

/// Manually driven clock for deterministic tests.
///
/// The reading only changes through [`set_now`](Self::set_now) or
/// [`advance`](Self::advance). A dispatcher waiting on timed work does not notice a
/// change by itself; call [`Dispatcher::invoke`](crate::Dispatcher::invoke) or enqueue
/// something afterwards.
#[derive(Debug, Default)]
pub struct PseudoTimeSource {
    /// Current reading.
    now: Mutex<TimePoint>,
}

impl PseudoTimeSource {
    /// Create a pseudo clock reading [`TimePoint::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pseudo clock reading `now`.
    #[must_use]
    pub fn with_now(now: TimePoint) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Set the current reading.
    pub fn set_now(&self, value: TimePoint) {
        *self.now.lock() = value;
    }

    /// Move the current reading forward by `by` and return the new value.
    pub fn advance(&self, by: Duration) -> TimePoint {
        let mut now = self.now.lock();
        *now += by;
        *now
    }
}

impl TimeSource for PseudoTimeSource {
    fn now(&self) -> TimePoint {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_clock_only_moves_when_told() {
        let clock = PseudoTimeSource::new();
        assert_eq!(clock.now(), TimePoint::ZERO);
        clock.set_now(TimePoint::from_millis(40));
        assert_eq!(clock.now(), TimePoint::from_millis(40));
        assert_eq!(
            clock.advance(Duration::from_millis(5)),
            TimePoint::from_millis(45)
        );
        assert_eq!(clock.now(), TimePoint::from_millis(45));
    }

    #[test]
    fn hardware_clock_is_monotonic() {
        let clock = HardwareTimeSource::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn saturating_difference() {
        let early = TimePoint::from_millis(10);
        let late = TimePoint::from_millis(25);
        assert_eq!(
            late.saturating_duration_since(early),
            Duration::from_millis(15)
        );
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }
}
