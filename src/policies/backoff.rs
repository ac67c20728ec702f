//! # Backoff between retries of a failed task.
//!
//! A task that fails with a retryable error goes back to `pending` but is not
//! eligible for dispatch until its backoff delay elapses. [`BackoffPolicy`]
//! computes that delay from the retry number:
//!
//! `delay(n) = min(first × factor^(n-1), max)`, then jitter.
//!
//! The base delay depends only on the retry number, so jitter never feeds back
//! into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use autotask::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(200),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay_for(3), Duration::from_millis(800));
//! assert_eq!(backoff.delay_for(20), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 1.0` (constant), `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Requeued tasks are eligible immediately.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Exponential backoff (`factor = 2.0`) with equal jitter.
    pub fn exponential(first: Duration, max: Duration) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }

    /// Delay before retry number `retry` (1-based; `0` is treated as `1`).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max))
        } else {
            self.max
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max: Duration) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn first_retry_uses_first_delay() {
        let p = exp(100, Duration::from_secs(30));
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
    }

    #[test]
    fn grows_exponentially_until_max() {
        let p = exp(100, Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
        assert_eq!(p.delay_for(5), Duration::from_secs(1));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn default_is_constant() {
        let p = BackoffPolicy::default();
        for retry in 1..10 {
            assert_eq!(p.delay_for(retry), Duration::from_millis(100));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = exp(10_000, Duration::from_secs(5));
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
    }

    #[test]
    fn unbounded_max_saturates() {
        let p = BackoffPolicy {
            first: Duration::MAX,
            max: Duration::MAX,
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.delay_for(1), Duration::MAX);
        assert_eq!(p.delay_for(40), Duration::MAX);
    }

    #[test]
    fn immediate_is_zero() {
        assert_eq!(BackoffPolicy::immediate().delay_for(3), Duration::ZERO);
    }

    #[test]
    fn exponential_jitter_never_exceeds_base() {
        let p = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30));
        for retry in 1..12 {
            let base = Duration::from_millis(100 * 2u64.pow(retry - 1)).min(Duration::from_secs(30));
            let d = p.delay_for(retry);
            assert!(d <= base, "retry {retry}: {d:?} > {base:?}");
            assert!(d >= base / 2, "retry {retry}: {d:?} < half of {base:?}");
        }
    }
}
