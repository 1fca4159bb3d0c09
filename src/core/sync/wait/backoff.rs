/*!
 * Caller-Side Exponential Backoff
 *
 * No primitive in this crate retries on its own. When `try_acquire` reports
 * contention the caller picks a policy; `Backoff` is the stock one.
 *
 * # Phases
 *
 * 1. **Spin** (`spin_limit` steps): `spin_loop()` hint, doubling per step
 * 2. **Yield** (`yield_limit` steps): `yield_now()`
 * 3. **Sleep**: exponentially increasing sleep, capped at `max_backoff`
 */

use crate::core::sync::SyncConfig;
use std::thread;
use std::time::Duration;

/// Exponential backoff for caller retry loops
#[derive(Debug, Clone)]
pub struct Backoff {
    step: u32,
    spin_limit: u32,
    yield_limit: u32,
    max_sleep: Duration,
    sleep: Duration,
}

impl Backoff {
    /// Backoff with the process-wide configuration
    pub fn new() -> Self {
        Self::from_config(&crate::core::sync::global_config())
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            step: 0,
            spin_limit: config.spin_limit,
            yield_limit: config.yield_limit,
            max_sleep: config.max_backoff,
            sleep: Duration::from_nanos(500),
        }
    }

    /// Wait once, escalating with every call
    pub fn snooze(&mut self) {
        if self.step < self.spin_limit {
            // 2^step spins, capped so early steps stay in the nanosecond range
            for _ in 0..(1u32 << self.step.min(6)) {
                std::hint::spin_loop();
            }
        } else if self.step < self.spin_limit + self.yield_limit {
            thread::yield_now();
        } else {
            thread::sleep(self.sleep);
            self.sleep = (self.sleep * 2).min(self.max_sleep);
        }
        self.step = self.step.saturating_add(1);
    }

    /// True once spinning and yielding are exhausted (now sleeping)
    pub fn is_sleeping(&self) -> bool {
        self.step >= self.spin_limit + self.yield_limit
    }

    /// Number of `snooze` calls since creation or `reset`
    pub fn attempts(&self) -> u32 {
        self.step
    }

    pub fn reset(&mut self) {
        self.step = 0;
        self.sleep = Duration::from_nanos(500);
    }

    /// Run `attempt` until it yields `Some`, snoozing between tries
    ///
    /// Gives up after `max_attempts` tries and returns `None`; the caller
    /// decides on the fallback.
    pub fn retry<T, F>(&mut self, max_attempts: u32, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Option<T>,
    {
        for n in 0..max_attempts {
            if let Some(value) = attempt() {
                return Some(value);
            }
            if n + 1 < max_attempts {
                self.snooze();
            }
        }
        None
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
