//! Fake clocks for deterministic tests.

use std::ops::Add;
use std::sync::Mutex;
use std::time::{Duration, Instant as StdInstant};

use chrono::{DateTime, Utc};

use crate::clock::InstantClock;
use crate::wall_clock::WallClock;

/// A clock whose `now()` can be advanced manually, for tests that exercise time-dependent
/// behavior (reorganization intervals, expiry) without sleeping.
#[derive(Debug)]
pub struct FakeClock<I: Copy + Add<Duration, Output = I> + Send + Sync> {
    offset: Mutex<Duration>,
    base_instant: I,
}

impl<I: Copy + Add<Duration, Output = I> + Send + Sync> FakeClock<I> {
    /// Creates a fake clock whose `now()` starts at `base_instant`.
    pub fn new(base_instant: I) -> Self {
        FakeClock { offset: Mutex::new(Duration::ZERO), base_instant }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut off = self.offset.lock().unwrap();
        *off = off.saturating_add(duration);
    }
}

impl<I: Copy + Add<Duration, Output = I> + Send + Sync> InstantClock for FakeClock<I> {
    type Instant = I;

    fn now(&self) -> I {
        let off = *self.offset.lock().unwrap();
        self.base_instant + off
    }
}

impl Default for FakeClock<StdInstant> {
    fn default() -> Self {
        FakeClock { offset: Mutex::new(Duration::ZERO), base_instant: StdInstant::now() }
    }
}

/// A [`WallClock`] whose `now()` can be set and advanced manually, for tests that exercise
/// expiry and other wall-clock-dependent behavior.
#[derive(Debug)]
pub struct FakeWallClock {
    current: Mutex<DateTime<Utc>>,
}

impl FakeWallClock {
    /// Creates a fake wall clock whose `now()` starts at `base_time`.
    pub fn new(base_time: DateTime<Utc>) -> Self {
        FakeWallClock { current: Mutex::new(base_time) }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += chrono::Duration::from_std(duration).expect("duration too large");
    }

    /// Sets the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.lock().unwrap() = time;
    }
}

impl Default for FakeWallClock {
    fn default() -> Self {
        FakeWallClock { current: Mutex::new(Utc::now()) }
    }
}

impl WallClock for FakeWallClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant as StdInstant};

    use super::{FakeClock, FakeWallClock};
    use crate::clock::InstantClock;
    use crate::wall_clock::WallClock;

    #[test]
    fn test_fake_clock_advances() {
        let clock = FakeClock::<StdInstant>::default();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn test_fake_wall_clock_advances() {
        let clock = FakeWallClock::default();
        let start = clock.now();
        clock.advance(Duration::from_secs(3));
        assert_eq!((clock.now() - start).num_seconds(), 3);
    }

    #[test]
    fn test_fake_wall_clock_set() {
        let clock = FakeWallClock::default();
        let target = chrono::Utc::now() + chrono::Duration::hours(1);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
