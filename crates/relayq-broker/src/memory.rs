//! In-process broker/backend pair with no external dependencies.
//!
//! Supplements the two wire transports for fast tests of the worker pool
//! and client: a `VecDeque` stands in for the queue, a `HashMap` stands in
//! for the result store, and neither survives past the process.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;
use relayq_core::{decode_envelope, ResultRecord, TaskEnvelope, TaskRecord};
use tracing::debug;

use crate::error::BrokerResult;
use crate::traits::{Backend, Broker};

/// An in-memory FIFO queue of envelopes.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queue: RwLock<VecDeque<TaskEnvelope>>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.read().expect("queue lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn send(&self, envelope: TaskEnvelope) -> BrokerResult<()> {
        self.queue
            .write()
            .expect("queue lock poisoned")
            .push_back(envelope);
        Ok(())
    }

    async fn get_task(&self) -> BrokerResult<Option<TaskRecord>> {
        let envelope = self.queue.write().expect("queue lock poisoned").pop_front();
        match envelope {
            None => Ok(None),
            Some(envelope) => {
                let record = decode_envelope(&envelope)?;
                debug!(task_id = %record.id, task = %record.task, "dequeued in-memory task");
                Ok(Some(record))
            }
        }
    }
}

/// An in-memory result store with no TTL eviction (process lifetime only).
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    results: RwLock<HashMap<String, ResultRecord>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn set_result(&self, result: ResultRecord) -> BrokerResult<()> {
        debug!(task_id = %result.task_id, "storing in-memory result");
        self.results
            .write()
            .expect("results lock poisoned")
            .insert(result.task_id.clone(), result);
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> BrokerResult<Option<ResultRecord>> {
        Ok(self
            .results
            .read()
            .expect("results lock poisoned")
            .get(task_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::{encode_submission, Route, Submission};

    fn route() -> Route {
        Route {
            exchange: "celery".to_string(),
            routing_key: "celery".to_string(),
            queue: "celery".to_string(),
        }
    }

    #[tokio::test]
    async fn send_then_get_task_round_trips() {
        let broker = InMemoryBroker::new();
        let (envelope, id) = encode_submission(Submission::new("tasks.add"), &route());
        broker.send(envelope).await.unwrap();
        assert_eq!(broker.len(), 1);

        let task = broker.get_task().await.unwrap().unwrap();
        assert_eq!(task.id, id);
        assert!(broker.is_empty());
    }

    #[tokio::test]
    async fn get_task_on_empty_queue_returns_none() {
        let broker = InMemoryBroker::new();
        assert!(broker.get_task().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_round_trips_result() {
        let backend = InMemoryBackend::new();
        assert!(backend.get_result("missing").await.unwrap().is_none());

        let result = ResultRecord {
            task_id: "task-1".to_string(),
            status: relayq_core::ResultStatus::Success,
            result: serde_json::json!(3),
            traceback: None,
            children: None,
        };
        backend.set_result(result.clone()).await.unwrap();

        let fetched = backend.get_result("task-1").await.unwrap().unwrap();
        assert_eq!(fetched, result);
    }

    #[tokio::test]
    async fn fifo_order_is_preserved_up_to_concurrency() {
        let broker = InMemoryBroker::new();
        for name in ["tasks.a", "tasks.b", "tasks.c"] {
            let (envelope, _id) = encode_submission(Submission::new(name), &route());
            broker.send(envelope).await.unwrap();
        }
        let first = broker.get_task().await.unwrap().unwrap();
        let second = broker.get_task().await.unwrap().unwrap();
        let third = broker.get_task().await.unwrap().unwrap();
        assert_eq!(first.task, "tasks.a");
        assert_eq!(second.task, "tasks.b");
        assert_eq!(third.task, "tasks.c");
    }
}
