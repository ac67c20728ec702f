//! Retry policies.
//!
//! This module groups the knobs that decide **whether** a failed task is
//! requeued and **when** it becomes eligible again.
//!
//! ## Contents
//! - [`RetryPolicy`] / [`RetryDecision`]: requeue or fail, given the error and budget
//! - [`BackoffPolicy`]: how the delay before a retry evolves (first / factor / max + jitter)
//! - [`JitterPolicy`]: randomization to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! Config { max_retries, backoff }
//!      └─► core::store uses:
//!           - RetryPolicy::decide(task, err) on every failed attempt
//!           - RetryDecision::Requeue.delay to park the task in the ready queue
//! ```

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryDecision, RetryPolicy};
