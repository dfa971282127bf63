//! # relayq-worker
//!
//! The handler registry (native callables and structured handlers) and
//! the bounded-concurrency worker pool that dispatches tasks to them.

pub mod error;
pub mod pool;
pub mod registry;

pub use error::{DispatchError, DispatchResult};
pub use pool::WorkerPool;
pub use registry::{coerce_arg, Handler, HandlerRegistry, ParamType, StructuredHandler};
