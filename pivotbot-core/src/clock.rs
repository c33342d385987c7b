//! Bounded waiting: a sleep seam plus an explicit retry policy.
//!
//! Position verification polls the exchange on a fixed cadence. The sleep
//! goes through a trait so tests drive the poll loop with a fake instead of
//! real delays, and the bound (attempts × interval) is explicit data rather
//! than constants buried in a loop.

use std::time::Duration;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSleeper;

impl Sleeper for SystemSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Never sleeps. For dry runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Fixed-cadence retry: up to `attempts` probes, sleeping `interval` after
/// each failed one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Run `probe` until it yields a value or attempts are exhausted.
    pub fn poll<T>(
        &self,
        sleeper: &dyn Sleeper,
        mut probe: impl FnMut(u32) -> Option<T>,
    ) -> Option<T> {
        for attempt in 0..self.attempts {
            if let Some(value) = probe(attempt) {
                return Some(value);
            }
            if attempt + 1 < self.attempts {
                sleeper.sleep(self.interval);
            }
        }
        None
    }

    /// Total worst-case wait.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }
}
