//! [`FixedBackoff`] – retry with a constant delay between attempts.
//!
//! Used while waiting for the motion controller to power on.  Only
//! [`TankError::NetworkUnready`] is retried; any other error is returned to
//! the caller on the spot.  Production code runs without an attempt bound,
//! so the wait lasts until the hardware answers.

use std::time::Duration;

use tank_types::TankError;
use tracing::{debug, info};

use crate::clock::Clock;

/// Retry policy with a fixed interval and an optional attempt bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl FixedBackoff {
    /// Unbounded retry, sleeping `interval` between attempts.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Give up after `attempts` tries (at least one attempt is always made).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt bound is reached.
    ///
    /// # Errors
    ///
    /// Returns the first non-[`NetworkUnready`][TankError::NetworkUnready]
    /// error, or the last `NetworkUnready` once the bound is exhausted.
    pub fn retry<T, F>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T, TankError>
    where
        F: FnMut() -> Result<T, TankError>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(what, attempt, "reachable after retrying");
                    }
                    return Ok(value);
                }
                Err(TankError::NetworkUnready(reason)) => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(TankError::NetworkUnready(reason));
                    }
                    debug!(what, attempt, %reason, retry_in = ?self.interval, "not ready yet");
                    clock.sleep(self.interval);
                }
                Err(other) => return Err(other),
            }
        }
    }
}
