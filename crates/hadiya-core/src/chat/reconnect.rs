//! Reconnection policy for the realtime feed.
//!
//! Exponential backoff with a retry ceiling:
//!
//! - delay before attempt `n` (1-based) = `min(base * 2^(n-1), max)`
//! - at most `max_attempts` automatic attempts; after that the session stays
//!   disconnected until something resets the policy
//! - every successful connection resets the counter
//!
//! [`RetryTimer`] is the owned handle for a scheduled attempt. Dropping it
//! cancels the attempt.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use hadiya_types::config::ReconnectConfig;
use tokio::time::{Instant, Sleep};

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// Attempt counter plus backoff math.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_attempts: config.max_attempts,
            attempts: 0,
        }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let exponential = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Claim the next attempt, returning its number and delay.
    ///
    /// Returns `None` once `max_attempts` have been used since the last
    /// reset.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, self.delay_for_attempt(self.attempts)))
    }

    /// Forget previous attempts (after a successful open or a manual retry).
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts used since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(&ReconnectConfig::default())
    }
}

// ---------------------------------------------------------------------------
// RetryTimer
// ---------------------------------------------------------------------------

/// A scheduled reconnection attempt. Resolves to the attempt number.
#[derive(Debug)]
pub struct RetryTimer {
    attempt: u32,
    sleep: Pin<Box<Sleep>>,
}

impl RetryTimer {
    pub fn start(attempt: u32, delay: Duration) -> Self {
        Self {
            attempt,
            sleep: Box::pin(tokio::time::sleep(delay)),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }
}

impl Future for RetryTimer {
    type Output = u32;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<u32> {
        match self.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(self.attempt),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_one_second() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| policy.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000]);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_matches_formula_for_all_attempts() {
        let policy = ReconnectPolicy::default();
        for n in 1..=64u32 {
            let expected = (1_000u64.saturating_mul(1u64 << (n - 1).min(31))).min(30_000);
            assert_eq!(policy.delay_for_attempt(n), Duration::from_millis(expected), "attempt {n}");
        }
    }

    #[test]
    fn test_no_sixth_attempt() {
        let mut policy = ReconnectPolicy::default();
        for n in 1..=5 {
            let (attempt, _) = policy.next_attempt().unwrap();
            assert_eq!(attempt, n);
        }
        assert!(policy.is_exhausted());
        assert!(policy.next_attempt().is_none());
        assert_eq!(policy.attempts(), 5);
    }

    #[test]
    fn test_reset_restores_full_budget() {
        let mut policy = ReconnectPolicy::default();
        policy.next_attempt();
        policy.next_attempt();
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_attempt(), Some((1, Duration::from_millis(1_000))));
    }

    #[test]
    fn test_custom_config() {
        let mut policy = ReconnectPolicy::new(&ReconnectConfig {
            base_delay_ms: 250,
            max_delay_ms: 600,
            max_attempts: 2,
        });
        assert_eq!(policy.next_attempt(), Some((1, Duration::from_millis(250))));
        assert_eq!(policy.next_attempt(), Some((2, Duration::from_millis(500))));
        assert_eq!(policy.next_attempt(), None);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_timer_fires_after_delay() {
        let start = Instant::now();
        let timer = RetryTimer::start(3, Duration::from_millis(4_000));
        assert_eq!(timer.attempt(), 3);
        assert_eq!(timer.deadline(), start + Duration::from_millis(4_000));
        let attempt = timer.await;
        assert_eq!(attempt, 3);
        assert_eq!(start.elapsed(), Duration::from_millis(4_000));
    }
}
