//! Runtime core: store, scheduling and lifecycle.
//!
//! The public API of this module is [`Engine`], [`EngineBuilder`] and [`Config`].
//!
//! Internal modules:
//! - [`queue`]: priority-ordered ready queue with delayed (backoff) entries;
//! - [`store`]: task map, checked transitions, journal writes, event publication;
//! - [`runner`]: executes one attempt with timeout and panic isolation;
//! - [`dispatcher`]: the selection loop and worker slots;
//! - [`shutdown`]: cross-platform termination signals.

mod builder;
mod config;
mod dispatcher;
mod engine;
mod queue;
mod runner;
mod shutdown;
mod store;


pub use builder::EngineBuilder;
pub use config::Config;
pub use engine::Engine;
