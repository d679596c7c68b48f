// src/engine/retry.rs

use std::time::Duration;

/// Outcome of a retry decision for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the given backoff delay.
    Retry(Duration),
    /// Retry budget exhausted; finalize the task as failed.
    GiveUp,
}

/// Decides, on failure, whether a task is retried and after how long.
///
/// Delay for the n-th failed attempt is exponential with a cap:
/// `min(base_delay * 2^(n-1), max_delay)`, multiplied by a jitter factor in
/// `[0.5, 1.5)` when `jitter` is on, so simultaneous retries spread out.
///
/// With base=500ms, max=30s (the defaults):
/// - attempt 1: 500ms
/// - attempt 2: 1s
/// - attempt 3: 2s
/// - ...
/// - attempt 8 and beyond: 30s (capped)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomize delays. Tests turn this off for exact assertions.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failed attempt.
    ///
    /// `attempts` is the number of attempts started so far (the one that just
    /// failed included); `max_retries` bounds the total attempts, so a task
    /// that always fails runs exactly `max_retries` times.
    pub fn decide(&self, attempts: u32, max_retries: u32) -> RetryDecision {
        if attempts >= max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempts))
        }
    }

    /// Backoff delay after the n-th failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let uncapped = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let capped = uncapped.min(self.max_delay.as_secs_f64());

        let factor = if self.jitter {
            0.5 + rand::random::<f64>()
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }
}
