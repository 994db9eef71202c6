//! Reconnection policy.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStrategy {
    Fixed {
        delay: Duration,
    },
    Backoff {
        base: Duration,
        cap: Duration,
        max_attempts: u32,
    },
}

impl ReconnectStrategy {
    fn base_delay(&self) -> Duration {
        match *self {
            ReconnectStrategy::Fixed { delay } => delay,
            ReconnectStrategy::Backoff { base, .. } => base,
        }
    }
}

/// What to do after a failed connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// No attempts left; the session stays down until reopened.
    Exhausted { attempts: u32 },
}

/// Consecutive-failure bookkeeping for one session.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    strategy: ReconnectStrategy,
    attempt: u32,
    next_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(strategy: ReconnectStrategy) -> Self {
        Self {
            strategy,
            attempt: 0,
            next_delay: strategy.base_delay(),
        }
    }

    pub fn strategy(&self) -> ReconnectStrategy {
        self.strategy
    }

    /// Failed connect attempts since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Called on every successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.strategy.base_delay();
    }

    /// Record a failed connect attempt. The returned delay is the one that was
    /// current before the failure; the policy advances afterwards.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempt = self.attempt.saturating_add(1);
        match self.strategy {
            ReconnectStrategy::Fixed { delay } => RetryDecision::RetryAfter(delay),
            ReconnectStrategy::Backoff {
                cap, max_attempts, ..
            } => {
                if self.attempt >= max_attempts {
                    return RetryDecision::Exhausted {
                        attempts: self.attempt,
                    };
                }
                let delay = self.next_delay;
                self.next_delay = delay.saturating_mul(2).min(cap);
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn fixed_never_exhausts() {
        let mut policy = ReconnectPolicy::new(ReconnectStrategy::Fixed { delay: secs(5) });
        for _ in 0..100 {
            assert_eq!(policy.record_failure(), RetryDecision::RetryAfter(secs(5)));
        }
        assert_eq!(policy.attempt(), 100);
    }

    #[test]
    fn backoff_grows_to_cap_then_exhausts() {
        let mut policy = ReconnectPolicy::new(ReconnectStrategy::Backoff {
            base: secs(1),
            cap: secs(5),
            max_attempts: 5,
        });
        let decisions: Vec<RetryDecision> = (0..5).map(|_| policy.record_failure()).collect();
        assert_eq!(
            decisions,
            vec![
                RetryDecision::RetryAfter(secs(1)),
                RetryDecision::RetryAfter(secs(2)),
                RetryDecision::RetryAfter(secs(4)),
                RetryDecision::RetryAfter(secs(5)),
                RetryDecision::Exhausted { attempts: 5 },
            ]
        );
    }

    #[test]
    fn reset_restores_base() {
        let mut policy = ReconnectPolicy::new(ReconnectStrategy::Backoff {
            base: secs(1),
            cap: secs(5),
            max_attempts: 5,
        });
        policy.record_failure();
        policy.record_failure();
        assert_eq!(policy.next_delay(), secs(4));

        policy.reset();
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.next_delay(), secs(1));
    }
}
