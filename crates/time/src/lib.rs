#![warn(missing_docs)]
//! Time utilities and abstractions for testing and production.
//!
//! Components that need to measure elapsed time or schedule periodic work depend on the
//! [`clock::InstantClock`] and [`wall_clock::WallClock`] traits instead of calling
//! [`std::time::Instant::now`] or [`chrono::Utc::now`] directly, so that tests can advance time
//! deterministically with [`test_utils::FakeClock`] and [`test_utils::FakeWallClock`].

pub mod clock;
#[cfg(feature = "tokio")]
pub mod ticker;
pub mod wall_clock;

#[cfg(any(feature = "testing", test))]
pub mod test_utils;
