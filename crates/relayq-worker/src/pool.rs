//! Bounded-concurrency worker pool: a single poller plus up to `N`
//! concurrently executing worker activities.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relayq_broker::{Backend, Broker};
use relayq_core::{ResultRecord, ResultStatus, TaskRecord};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::registry::HandlerRegistry;

/// Default sleep between empty polls.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

fn is_expired(task: &TaskRecord) -> bool {
    let Some(expires) = task.expires.as_deref() else {
        return false;
    };
    match DateTime::parse_from_rfc3339(expires) {
        Ok(deadline) => deadline.with_timezone(&Utc) < Utc::now(),
        Err(_) => false,
    }
}

/// A single poller plus a capacity-bounded pool of worker activities,
/// coordinated through a semaphore and a single cancellation scope.
pub struct WorkerPool {
    registry: Arc<HandlerRegistry>,
    broker: Arc<dyn Broker>,
    backend: Arc<dyn Backend>,
    semaphore: Arc<Semaphore>,
    cancellation: CancellationToken,
    tracker: TaskTracker,
    rate_limit: Duration,
    poller: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        num_workers: usize,
        registry: Arc<HandlerRegistry>,
        broker: Arc<dyn Broker>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            registry,
            broker,
            backend,
            semaphore: Arc::new(Semaphore::new(num_workers)),
            cancellation: CancellationToken::new(),
            tracker: TaskTracker::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
            poller: StdMutex::new(None),
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Starts the background poller. Calling `start` twice without an
    /// intervening `cancel`/`wait_for_stop` is a logic error the caller
    /// must avoid; this mirrors the CREATED → RUNNING transition.
    pub fn start(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move { pool.poll_loop().await });
        *self.poller.lock().expect("poller handle lock poisoned") = Some(handle);
    }

    async fn poll_loop(self: Arc<Self>) {
        loop {
            if self.cancellation.is_cancelled() {
                debug!("worker pool cancelled, poller exiting");
                return;
            }

            let task = match self.broker.get_task().await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    tokio::time::sleep(self.rate_limit).await;
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "broker poll failed");
                    tokio::time::sleep(self.rate_limit).await;
                    continue;
                }
            };

            let permit = tokio::select! {
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                () = self.cancellation.cancelled() => return,
            };

            let pool = Arc::clone(&self);
            self.tracker.spawn(async move {
                let _permit = permit;
                pool.run_one(task).await;
            });
        }
    }

    async fn run_one(&self, task: TaskRecord) {
        let task_id = task.id.clone();

        if is_expired(&task) {
            warn!(
                task_id = %task_id,
                task = %task.task,
                error = %DispatchError::Expired,
                "task expired before dispatch"
            );
            return;
        }

        let outcome = self.registry.dispatch(&task.task, &task.args, &task.kwargs);
        match outcome {
            Ok(value) => {
                let result = ResultRecord {
                    task_id: task_id.clone(),
                    status: ResultStatus::Success,
                    result: value,
                    traceback: None,
                    children: None,
                };
                if let Err(err) = self.backend.set_result(result).await {
                    error!(task_id = %task_id, error = %err, "failed to store result");
                }
            }
            Err(DispatchError::TaskUnregistered { task }) => {
                warn!(%task, "no handler registered, dropping");
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "handler failed, dropping");
            }
        }
    }

    /// Stops accepting new work. Currently running activities run to
    /// completion; await [`WorkerPool::wait_for_stop`] to block until
    /// they finish.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Blocks until the poller has exited and every dispatched activity
    /// has completed.
    pub async fn wait_for_stop(&self) {
        if let Some(handle) = self.poller.lock().expect("poller handle lock poisoned").take() {
            let _ = handle.await;
        }
        self.tracker.close();
        self.tracker.wait().await;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_broker::{InMemoryBackend, InMemoryBroker};
    use relayq_core::{encode_submission, Route, Submission};
    use std::collections::HashMap;

    fn route() -> Route {
        Route {
            exchange: "celery".to_string(),
            routing_key: "celery".to_string(),
            queue: "celery".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatches_a_registered_task_and_stores_its_result() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register(
            "tasks.add",
            crate::registry::Handler::callable(
                vec![crate::registry::ParamType::Int, crate::registry::ParamType::Int],
                |args| Ok(serde_json::json!(args[0].as_i64().unwrap() + args[1].as_i64().unwrap())),
            ),
        );

        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryBackend::new());

        let submission =
            Submission::new("tasks.add").with_args(vec![serde_json::json!(1), serde_json::json!(2)]);
        let (envelope, task_id) = encode_submission(submission, &route());
        broker.send(envelope).await.unwrap();

        let pool = Arc::new(
            WorkerPool::new(2, registry, broker, backend.clone())
                .with_rate_limit(Duration::from_millis(5)),
        );
        pool.start();

        let mut result = None;
        for _ in 0..50 {
            if let Some(record) = backend.get_result(&task_id).await.unwrap() {
                result = Some(record);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        pool.cancel();
        pool.wait_for_stop().await;

        let result = result.expect("result should have been stored");
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.result, serde_json::json!(3));
    }

    #[tokio::test]
    async fn unregistered_task_is_dropped_without_storing_a_result() {
        let registry = Arc::new(HandlerRegistry::new());
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryBackend::new());

        let (envelope, task_id) = encode_submission(Submission::new("tasks.missing"), &route());
        broker.send(envelope).await.unwrap();

        let pool = Arc::new(
            WorkerPool::new(1, registry, broker, backend.clone())
                .with_rate_limit(Duration::from_millis(5)),
        );
        pool.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        pool.cancel();
        pool.wait_for_stop().await;

        assert!(backend.get_result(&task_id).await.unwrap().is_none());
    }

    #[test]
    fn is_expired_detects_past_deadlines() {
        let mut task = TaskRecord {
            id: "1".to_string(),
            task: "tasks.add".to_string(),
            args: Vec::new(),
            kwargs: HashMap::new(),
            retries: 0,
            eta: None,
            expires: Some("2000-01-01T00:00:00Z".to_string()),
        };
        assert!(is_expired(&task));

        task.expires = Some("2999-01-01T00:00:00Z".to_string());
        assert!(!is_expired(&task));

        task.expires = None;
        assert!(!is_expired(&task));
    }
}
