//! A wall-clock abstraction for timestamps that must be comparable across process restarts (e.g.
//! a transaction's `received_at` field), as opposed to [`crate::clock::InstantClock`], which is
//! only meaningful within a single process lifetime.

use chrono::{DateTime, Utc};

/// A source of the current wall-clock time.
pub trait WallClock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The production wall clock, backed by [`chrono::Utc::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
