//! # Executors: pluggable handlers for task types.
//!
//! - [`TaskExecutor`] - trait implemented by every handler
//! - [`Invocation`] - input of one attempt
//! - [`ExecutorFn`] - closure-backed executor
//! - [`ExecutorRegistry`] - type → executor map consulted by the dispatcher

mod executor;
mod executor_fn;
mod registry;

pub use executor::{ExecutorRef, Invocation, TaskExecutor};
pub use executor_fn::ExecutorFn;
pub use registry::ExecutorRegistry;
