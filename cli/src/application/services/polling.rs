//! Poll cadence and deadline shared by every convergence loop.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Interval between observations plus an optional absolute deadline.
///
/// One `Polling` is created per user-visible operation and threaded through
/// every loop that operation runs, so nested loops share the deadline.
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    interval: Duration,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl Polling {
    /// Start the clock now.
    #[must_use]
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Total time budget, zero when unbounded.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.timeout.unwrap_or_default()
    }

    /// A fresh ticker whose first tick completes immediately.
    #[must_use]
    pub fn ticker(&self) -> Ticker {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ticker {
            interval,
            deadline: self.deadline,
        }
    }
}

/// Drives one poll loop.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    deadline: Option<Instant>,
}

impl Ticker {
    /// Wait for the next tick; `false` once the deadline has passed.
    pub async fn tick(&mut self) -> bool {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.interval.tick() => Instant::now() < deadline,
                () = tokio::time::sleep_until(deadline) => false,
            },
            None => {
                self.interval.tick().await;
                true
            }
        }
    }
}
