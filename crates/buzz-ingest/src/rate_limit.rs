//! Minimum-spacing rate limiter with multiplicative backoff.
//!
//! Every protocol request passes through [`RateLimiter::await_slot`] before it
//! is sent. A 429 from the upstream doubles the spacing up to a hard ceiling.
//! The delay never shrinks back on its own; a fresh service instance starts
//! from the configured minimum again.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Smallest delay a backoff step can produce when starting from zero.
const MIN_BACKOFF_STEP: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    ceiling: Duration,
    last_request_at: Option<Instant>,
    backoff_count: u32,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, ceiling: Duration) -> Self {
        Self {
            min_delay: min_delay.min(ceiling),
            ceiling,
            last_request_at: None,
            backoff_count: 0,
        }
    }

    /// Suspend until at least `min_delay` has passed since the previous
    /// granted slot, then record the grant.
    pub async fn await_slot(&mut self) {
        if let Some(last) = self.last_request_at {
            let ready_at = last + self.min_delay;
            if ready_at > Instant::now() {
                tracing::debug!(
                    "rate limiter holding request for {:?}",
                    ready_at - Instant::now()
                );
                sleep_until(ready_at).await;
            }
        }
        self.last_request_at = Some(Instant::now());
    }

    /// Double the spacing, capped at the ceiling. Returns the new delay.
    pub fn on_throttled(&mut self) -> Duration {
        let previous = self.min_delay;
        self.min_delay = (previous * 2).max(MIN_BACKOFF_STEP).min(self.ceiling);
        self.backoff_count += 1;
        tracing::warn!(
            previous_ms = previous.as_millis() as u64,
            delay_ms = self.min_delay.as_millis() as u64,
            "upstream throttled, backing off"
        );
        self.min_delay
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Number of throttling-triggered backoff increases so far.
    pub fn backoff_count(&self) -> u32 {
        self.backoff_count
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        self.last_request_at
    }
}
