//! Broker and Backend port abstractions.
//!
//! These traits are the seam the worker pool and client code against;
//! transports (key/value, AMQP, in-memory) are interchangeable
//! implementations.

use async_trait::async_trait;
use relayq_core::{ResultRecord, TaskEnvelope, TaskRecord};

use crate::error::BrokerResult;

/// A `{exchange, routing_key, queue}` triple, re-exported from
/// `relayq_core` for convenience at this crate's public surface.
pub use relayq_core::Route;

/// Durable enqueue/dequeue of task deliveries.
///
/// `send` must be safe for concurrent callers. `get_task` may block up to
/// a transport-defined bound (roughly one second) but must never block
/// indefinitely; `Ok(None)` means "no task right now" and the worker pool
/// treats it as a cooling signal, not an error.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn send(&self, envelope: TaskEnvelope) -> BrokerResult<()>;

    async fn get_task(&self) -> BrokerResult<Option<TaskRecord>>;

    /// Declares a named route and binds it, if the transport supports
    /// routing (AMQP only; the key/value transport ignores this).
    async fn add_route(&self, _task_name: &str, _route: Route) -> BrokerResult<()> {
        Ok(())
    }

    /// Removes a previously added route, if supported.
    async fn del_route(&self, _task_name: &str) -> BrokerResult<()> {
        Ok(())
    }
}

/// Durable result storage with a 24-hour TTL.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn set_result(&self, result: ResultRecord) -> BrokerResult<()>;

    /// Non-blocking lookup. `Ok(None)` means the result is not yet
    /// stored; this is not an error.
    async fn get_result(&self, task_id: &str) -> BrokerResult<Option<ResultRecord>>;
}
