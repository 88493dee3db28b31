//! Declarative retry policy
//!
//! Retries are configured, not hand-rolled at call sites: a policy names the
//! attempt budget, the backoff curve, and which error kinds are retryable.

use std::time::Duration;

use rand::Rng;

use crate::error::{ErrorKind, MemoryError, Result};

/// Retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay before the second attempt
    pub base_delay: Duration,
    /// Backoff multiplier per attempt
    pub multiplier: f64,
    /// Random jitter fraction applied to each delay (0.0 = none)
    pub jitter: f64,
    /// Error kinds that warrant another attempt
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::optimistic_writes()
    }
}

impl RetryPolicy {
    /// Policy for optimistic-concurrency belief updates: 3 attempts with
    /// jittered exponential backoff, retrying only version conflicts.
    pub fn optimistic_writes() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
            jitter: 0.5,
            retryable: vec![ErrorKind::Conflict],
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
            retryable: vec![],
        }
    }

    /// Whether the given error should be retried at the given attempt
    /// (1-based; the first attempt is 1).
    pub fn should_retry(&self, err: &MemoryError, attempt: u32) -> bool {
        attempt < self.max_attempts && self.retryable.contains(&err.kind())
    }

    /// Delay to sleep before the next attempt after `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = self.base_delay.as_secs_f64() * exp;
        let jittered = if self.jitter > 0.0 {
            let spread = base * self.jitter;
            base + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            base
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Run `op` under this policy. The closure is re-invoked from scratch on
    /// each attempt; the final error is returned when the budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        kind = %err.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
