//! Submit-by-name client: `delay`/`delay_kwargs` hand a task to the
//! broker and return a handle that resolves to its result.

use std::collections::HashMap;
use std::sync::Arc;

use relayq_broker::{Backend, Broker, Route};
use relayq_core::{wrap_record, ObjectPool, TaskRecord};
use tracing::debug;

use crate::async_result::AsyncResult;
use crate::error::ClientResult;

fn blank_record() -> TaskRecord {
    TaskRecord {
        id: uuid::Uuid::new_v4().to_string(),
        task: String::new(),
        args: Vec::new(),
        kwargs: HashMap::new(),
        retries: 0,
        eta: None,
        expires: None,
    }
}

/// Domain-level facade over a [`Broker`]/[`Backend`] pair: submits tasks
/// by name and hands back an [`AsyncResult`] for retrieval.
///
/// `Client` is `Send + Sync` and cheap to clone — the broker and backend
/// are each held behind an `Arc`.
#[derive(Clone)]
pub struct Client {
    broker: Arc<dyn Broker>,
    backend: Arc<dyn Backend>,
    route: Route,
    records: Arc<ObjectPool<TaskRecord>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("queue", &self.route.queue)
            .field("exchange", &self.route.exchange)
            .finish()
    }
}

impl Client {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, backend: Arc<dyn Backend>, route: Route) -> Self {
        Self {
            broker,
            backend,
            route,
            records: Arc::new(ObjectPool::new()),
        }
    }

    /// Submits `task` with positional `args`, returning a handle that
    /// resolves to its result once a worker has run it.
    pub async fn delay(
        &self,
        task: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> ClientResult<AsyncResult> {
        self.submit(task.into(), args, HashMap::new()).await
    }

    /// Submits `task` with keyword arguments, returning a handle that
    /// resolves to its result once a worker has run it.
    pub async fn delay_kwargs(
        &self,
        task: impl Into<String>,
        kwargs: HashMap<String, serde_json::Value>,
    ) -> ClientResult<AsyncResult> {
        self.submit(task.into(), Vec::new(), kwargs).await
    }

    async fn submit(
        &self,
        task: String,
        args: Vec<serde_json::Value>,
        kwargs: HashMap<String, serde_json::Value>,
    ) -> ClientResult<AsyncResult> {
        let mut record = self.records.acquire(blank_record);
        record.task = task;
        record.args = args;
        record.kwargs = kwargs;
        record.retries = 0;
        record.eta = None;
        record.expires = None;

        let envelope = wrap_record(&record, &self.route);
        let task_id = record.id.clone();
        self.records.release(record);

        self.broker.send(envelope).await?;
        debug!(task_id = %task_id, "submitted task");

        Ok(AsyncResult::new(task_id, self.backend.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_broker::{InMemoryBackend, InMemoryBroker};
    use relayq_core::{ResultRecord, ResultStatus};
    use std::time::Duration;

    fn route() -> Route {
        Route {
            exchange: "celery".to_string(),
            routing_key: "celery".to_string(),
            queue: "celery".to_string(),
        }
    }

    #[tokio::test]
    async fn delay_enqueues_positional_args_and_returns_a_resolvable_handle() {
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(broker.clone(), backend.clone(), route());

        let handle = client
            .delay("tasks.add", vec![serde_json::json!(2), serde_json::json!(3)])
            .await
            .unwrap();

        assert_eq!(broker.len(), 1);
        let task = broker.get_task().await.unwrap().unwrap();
        assert_eq!(task.id, handle.task_id());
        assert_eq!(task.task, "tasks.add");
        assert_eq!(task.args, vec![serde_json::json!(2), serde_json::json!(3)]);
        assert!(task.kwargs.is_empty());

        backend
            .set_result(ResultRecord {
                task_id: handle.task_id().to_string(),
                status: ResultStatus::Success,
                result: serde_json::json!(5),
                traceback: None,
                children: None,
            })
            .await
            .unwrap();

        let result = handle.get(Duration::from_millis(200)).await.unwrap();
        assert_eq!(result, serde_json::json!(5));
    }

    #[tokio::test]
    async fn delay_kwargs_enqueues_keyword_arguments() {
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(broker.clone(), backend, route());

        let mut kwargs = HashMap::new();
        kwargs.insert("a".to_string(), serde_json::json!(1));
        kwargs.insert("b".to_string(), serde_json::json!(2));

        client.delay_kwargs("tasks.addkw", kwargs).await.unwrap();

        let task = broker.get_task().await.unwrap().unwrap();
        assert_eq!(task.task, "tasks.addkw");
        assert!(task.args.is_empty());
        assert_eq!(task.kwargs["a"], serde_json::json!(1));
        assert_eq!(task.kwargs["b"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn each_submission_gets_a_fresh_task_id() {
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(broker.clone(), backend, route());

        let first = client.delay("tasks.noop", vec![]).await.unwrap();
        let second = client.delay("tasks.noop", vec![]).await.unwrap();
        assert_ne!(first.task_id(), second.task_id());

        let a = broker.get_task().await.unwrap().unwrap();
        let b = broker.get_task().await.unwrap().unwrap();
        assert_ne!(a.id, b.id);
    }
}
