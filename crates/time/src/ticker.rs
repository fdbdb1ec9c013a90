//! A thin wrapper around [`tokio::time::interval`] for components that need to run work on a
//! fixed period (the mempool's reorganization and expiry sweeps).

use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Fires once immediately and then every `period`, skipping ticks it could not keep up with
/// instead of bursting through them.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    /// Creates a new ticker with the given period.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ticker { interval }
    }

    /// Waits for the next tick.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
