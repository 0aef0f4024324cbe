//! Exponential backoff with jitter, shared by handler retries and broker
//! reconnects.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Deterministic delay before retry number `attempt` (0-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// [`base_delay`](Self::base_delay) plus up to 25% random jitter, still
    /// capped at `max`. Keeps restarted consumers from reconnecting in
    /// lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let base_ms = base.as_millis() as u64;
        let jitter_ms = rand::rng().random_range(0..=base_ms / 4);
        (base + Duration::from_millis(jitter_ms)).min(self.max)
    }
}

/// How a transient handler failure is retried before the message is
/// handed back to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total handler invocations per delivery, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::new(Duration::from_millis(200), Duration::from_secs(5)),
        }
    }
}

/// How the consumer re-establishes a dropped broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt`, or `None` once the retry
    /// budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_retries).then(|| self.backoff.delay(attempt))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff: Backoff::new(Duration::from_millis(500), Duration::from_secs(30)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_delay_doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(800));
        assert_eq!(backoff.base_delay(4), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(500), Duration::from_secs(1));
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        for attempt in 0..6 {
            let base = backoff.base_delay(attempt);
            let delay = backoff.delay(attempt);
            assert!(delay >= base, "delay {delay:?} below base {base:?}");
            assert!(delay <= base + base / 4, "delay {delay:?} exceeds jitter bound");
        }
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        let backoff = Backoff::new(Duration::from_millis(800), Duration::from_secs(1));
        for _ in 0..50 {
            assert!(backoff.delay(5) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn reconnect_policy_stops_after_budget() {
        let policy = ReconnectPolicy {
            max_retries: 2,
            backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(100)),
        };
        assert!(policy.next_delay(0).is_some());
        assert!(policy.next_delay(1).is_some());
        assert!(policy.next_delay(2).is_none());
    }

    #[test]
    fn retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff.initial, Duration::from_millis(200));
    }
}
