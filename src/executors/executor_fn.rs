//! # Function-backed executor (`ExecutorFn`)
//!
//! [`ExecutorFn`] wraps a closure `F: Fn(Invocation) -> Fut`, producing a fresh
//! future per attempt. No state is shared between attempts unless the closure
//! captures it explicitly (e.g. an `Arc<...>`).
//!
//! ## Example
//! ```rust
//! use autotask::{ExecError, ExecutorFn, ExecutorRef, Invocation};
//! use serde_json::json;
//!
//! let notify: ExecutorRef = ExecutorFn::arc("notify", |inv: Invocation| async move {
//!     let to = inv.payload["to"].as_str().unwrap_or("site-manager").to_string();
//!     Ok::<_, ExecError>(json!({ "delivered": to }))
//! });
//!
//! assert_eq!(notify.name(), "notify");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecError;
use crate::executors::executor::{Invocation, TaskExecutor};

/// Function-backed executor implementation.
#[derive(Debug)]
pub struct ExecutorFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ExecutorFn<F> {
    /// Creates a new function-backed executor.
    ///
    /// Prefer [`ExecutorFn::arc`] when you immediately need an [`ExecutorRef`](crate::ExecutorRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the executor and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for ExecutorFn<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ExecError>> + Send + 'static,
{
    async fn execute(&self, invocation: Invocation) -> Result<Value, ExecError> {
        (self.f)(invocation).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
