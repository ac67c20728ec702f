//! # Engine configuration.
//!
//! [`Config`] centralizes the engine's tunables and is consumed by
//! [`Engine::builder`](crate::Engine::builder).
//!
//! ## Sentinel values
//! - `workers = 0` → treated as `1`
//! - `timeout = 0s` → attempts run without a timeout
//! - `retention = 0s` → no automatic eviction
//! - `grace = 0s` → shutdown does not wait for in-flight attempts

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Runtime configuration for the engine.
///
/// ## Field semantics
/// - `workers`: executions in flight at once (`1` = strictly sequential)
/// - `dispatch_delay`: pause after each execution before the slot is reused
/// - `max_retries`: retry budget for tasks enqueued without an explicit one
/// - `timeout`: per-attempt timeout (`0s` = none)
/// - `backoff`: delay before a requeued task becomes eligible again
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: how long `shutdown` waits for in-flight attempts
/// - `retention`/`evict_interval`: automatic eviction of old terminal tasks
///
/// All fields are public; prefer the accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of executions allowed in flight.
    ///
    /// The dispatcher takes a slot before selecting the next task, so
    /// selection stays priority-ordered for any value.
    pub workers: usize,

    /// Back-pressure pause after each execution.
    pub dispatch_delay: Duration,

    /// Default retry budget (`maxRetries`).
    pub max_retries: u32,

    /// Per-attempt timeout. A timed-out attempt is a retryable failure.
    pub timeout: Duration,

    /// Backoff applied to requeued tasks.
    pub backoff: BackoffPolicy,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Maximum wait for in-flight attempts on shutdown.
    pub grace: Duration,

    /// Age after which terminal tasks are evicted automatically (`0s` = never).
    pub retention: Duration,

    /// How often the automatic eviction runs when `retention > 0`.
    pub evict_interval: Duration,
}

impl Config {
    /// Returns the worker count, never less than 1.
    #[inline]
    pub fn worker_slots(&self) -> usize {
        self.workers.max(1)
    }

    /// Returns the per-attempt timeout as an `Option`.
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the retention window as an `Option`.
    #[inline]
    pub fn retention_window(&self) -> Option<Duration> {
        if self.retention == Duration::ZERO {
            None
        } else {
            Some(self.retention)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers = 1` (sequential dispatch)
    /// - `dispatch_delay = 100ms`
    /// - `max_retries = 3`
    /// - `timeout = 0s` (none)
    /// - `backoff = BackoffPolicy::default()` (constant 100ms)
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    /// - `retention = 0s` (manual eviction only), `evict_interval = 60s`
    fn default() -> Self {
        Self {
            workers: 1,
            dispatch_delay: Duration::from_millis(100),
            max_retries: 3,
            timeout: Duration::ZERO,
            backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
            retention: Duration::ZERO,
            evict_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none() {
        let cfg = Config {
            workers: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.worker_slots(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.attempt_timeout(), None);
        assert_eq!(cfg.retention_window(), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.dispatch_delay, Duration::from_millis(100));
        assert_eq!(cfg.worker_slots(), 1);
    }
}
