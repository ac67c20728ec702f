//! # Task data model.
//!
//! - [`Task`] - identity plus mutable lifecycle state
//! - [`TaskId`], [`TaskStatus`] - identifier and lifecycle status
//! - [`TaskType`], [`Priority`] - executor selection and scheduling tier
//! - [`ExecutionContext`] - who the task runs for
//! - [`TaskRequest`] - input of `enqueue`
//! - [`TaskFilter`] - constraints for `list`

mod context;
mod filter;
mod kind;
mod request;
mod task;

pub use context::ExecutionContext;
pub use filter::TaskFilter;
pub use kind::{Priority, TaskType};
pub use request::TaskRequest;
pub use task::{Task, TaskId, TaskStatus};
