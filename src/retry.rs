//! Retry policies for the two retry loops in the pipeline.
//!
//! The network fetcher retries single requests a handful of times with
//! exponential backoff (`base * 2^attempt`): 1 s → 2 s → 4 s → 8 s. Above it,
//! the page pipeline retries whole fetches at a slow fixed cadence, by default
//! forever, so an operator has time to refresh an expired cookie file while
//! the run waits.
//!
//! Both loops take a [`RetryPolicy`] value instead of hard-coded constants so
//! tests can bound the supervisory loop and shrink delays.

use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt_index`, saturating.
    Exponential { base: Duration },
    /// The same delay after every failure.
    Fixed(Duration),
}

impl Backoff {
    /// Delay to wait after the attempt with the given 0-based index failed.
    pub fn delay(&self, attempt_index: u32) -> Duration {
        match *self {
            Backoff::Exponential { base } => {
                let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
            Backoff::Fixed(delay) => delay,
        }
    }
}

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` retries until success or
    /// cancellation.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const FETCH_MAX_ATTEMPTS: u32 = 5;
    pub const FETCH_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const PAGE_COOLDOWN: Duration = Duration::from_secs(10);

    pub fn bounded(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            backoff,
        }
    }

    pub fn unbounded(backoff: Backoff) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    /// Five attempts, 1 s exponential backoff.
    pub fn fetch_default() -> Self {
        Self::bounded(
            Self::FETCH_MAX_ATTEMPTS,
            Backoff::Exponential {
                base: Self::FETCH_BASE_DELAY,
            },
        )
    }

    /// Unlimited attempts, fixed 10 s cooldown.
    pub fn supervisor_default() -> Self {
        Self::unbounded(Backoff::Fixed(Self::PAGE_COOLDOWN))
    }

    /// Whether another attempt may follow `attempts_made` completed attempts.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }

    pub fn delay_after(&self, attempt_index: u32) -> Duration {
        self.backoff.delay(attempt_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_schedule_doubles() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        let delays: Vec<u64> = (0..5).map(|i| b.delay(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn exponential_saturates_instead_of_overflowing() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert!(b.delay(40) >= b.delay(31));
    }

    #[test]
    fn fixed_is_constant() {
        let b = Backoff::Fixed(Duration::from_secs(10));
        assert_eq!(b.delay(0), b.delay(9));
    }

    #[test]
    fn bounded_policy_stops() {
        let p = RetryPolicy::fetch_default();
        assert!(p.allows_another(4));
        assert!(!p.allows_another(5));
    }

    #[test]
    fn unbounded_policy_never_stops() {
        let p = RetryPolicy::supervisor_default();
        assert!(p.allows_another(u32::MAX - 1));
        assert_eq!(p.delay_after(3), Duration::from_secs(10));
    }

    #[test]
    fn bounded_policy_makes_at_least_one_attempt() {
        let p = RetryPolicy::bounded(0, Backoff::Fixed(Duration::ZERO));
        assert_eq!(p.max_attempts, Some(1));
        assert!(p.allows_another(0));
    }
}
