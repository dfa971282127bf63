//! Key/value transport: `LPUSH`/`BRPOP` broker, `SETEX`/`GET` backend,
//! matching the legacy Redis peer byte-for-byte.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use relayq_core::{decode_envelope, ResultRecord, TaskEnvelope, TaskRecord};
use tracing::{debug, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::traits::{Backend, Broker};

/// Result entries are kept for 24 hours, matching the legacy peer's
/// `SETEX ... 86400`.
const RESULT_TTL_SECONDS: u64 = 86_400;

/// `BRPOP` blocks server-side for this many seconds before returning
/// an empty reply.
const BLOCK_SECONDS: f64 = 1.0;

fn result_key(task_id: &str) -> String {
    format!("celery-task-meta-{task_id}")
}

/// A Redis-backed broker using `LPUSH`/`BRPOP` against a single queue.
#[derive(Clone)]
pub struct KeyValueBroker {
    connection: ConnectionManager,
    queue_name: String,
}

impl std::fmt::Debug for KeyValueBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueBroker")
            .field("queue_name", &self.queue_name)
            .finish()
    }
}

impl KeyValueBroker {
    #[must_use]
    pub fn new(connection: ConnectionManager, queue_name: impl Into<String>) -> Self {
        Self {
            connection,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl Broker for KeyValueBroker {
    async fn send(&self, envelope: TaskEnvelope) -> BrokerResult<()> {
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| BrokerError::protocol(e.to_string()))?;
        let mut conn = self.connection.clone();
        conn.lpush::<_, _, ()>(&self.queue_name, payload).await?;
        Ok(())
    }

    async fn get_task(&self) -> BrokerResult<Option<TaskRecord>> {
        let mut conn = self.connection.clone();
        let reply: Option<(String, String)> = conn
            .brpop(&self.queue_name, BLOCK_SECONDS)
            .await?;

        let Some((queue, payload)) = reply else {
            return Ok(None);
        };

        if queue != self.queue_name {
            warn!(%queue, expected = %self.queue_name, "not a celery message!");
            return Err(BrokerError::protocol(format!(
                "BRPOP returned unexpected queue {queue}"
            )));
        }

        let envelope: TaskEnvelope =
            serde_json::from_str(&payload).map_err(|e| BrokerError::protocol(e.to_string()))?;
        let record = decode_envelope(&envelope)?;
        debug!(task_id = %record.id, task = %record.task, "dequeued key/value task");
        Ok(Some(record))
    }
}

/// A Redis-backed result store using `SETEX`/`GET`.
#[derive(Clone)]
pub struct KeyValueBackend {
    connection: ConnectionManager,
}

impl std::fmt::Debug for KeyValueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueBackend").finish()
    }
}

impl KeyValueBackend {
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Backend for KeyValueBackend {
    async fn set_result(&self, result: ResultRecord) -> BrokerResult<()> {
        let payload =
            serde_json::to_string(&result).map_err(|e| BrokerError::protocol(e.to_string()))?;
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(result_key(&result.task_id), payload, RESULT_TTL_SECONDS)
            .await?;
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> BrokerResult<Option<ResultRecord>> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(result_key(task_id)).await?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        let record: ResultRecord =
            serde_json::from_str(&payload).map_err(|e| BrokerError::protocol(e.to_string()))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_key_matches_the_legacy_prefix() {
        assert_eq!(
            result_key("4a1f8f1e-0000-4000-8000-000000000000"),
            "celery-task-meta-4a1f8f1e-0000-4000-8000-000000000000"
        );
    }

    // The tests below exercise `KeyValueBroker`/`KeyValueBackend` against a
    // real Redis server and are ignored by default since no live service is
    // available in this environment. Run with:
    //   REDIS_URL=redis://127.0.0.1/ cargo test -p relayq-broker -- --ignored
    async fn connection() -> ConnectionManager {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let client = redis::Client::open(url).expect("valid redis url");
        ConnectionManager::new(client)
            .await
            .expect("connect to live redis instance")
    }

    fn route() -> relayq_core::Route {
        relayq_core::Route {
            exchange: "celery".to_string(),
            routing_key: "celery".to_string(),
            queue: "relayq-kv-test".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a live redis instance"]
    async fn send_then_get_task_round_trips_through_a_live_redis() {
        let queue_name = "relayq-kv-test";
        let broker = KeyValueBroker::new(connection().await, queue_name);

        let submission = relayq_core::Submission::new("tasks.add")
            .with_args(vec![serde_json::json!(1), serde_json::json!(2)]);
        let (envelope, task_id) = relayq_core::encode_submission(submission, &route());
        broker.send(envelope).await.unwrap();

        let task = broker.get_task().await.unwrap().expect("task was enqueued");
        assert_eq!(task.id, task_id);
        assert_eq!(task.task, "tasks.add");
    }

    #[tokio::test]
    #[ignore = "requires a live redis instance"]
    async fn set_result_then_get_result_round_trips_through_a_live_redis() {
        let backend = KeyValueBackend::new(connection().await);
        let task_id = uuid::Uuid::new_v4().to_string();

        assert!(backend.get_result(&task_id).await.unwrap().is_none());

        backend
            .set_result(ResultRecord {
                task_id: task_id.clone(),
                status: relayq_core::ResultStatus::Success,
                result: serde_json::json!(3),
                traceback: None,
                children: None,
            })
            .await
            .unwrap();

        let result = backend.get_result(&task_id).await.unwrap().expect("result was stored");
        assert_eq!(result.result, serde_json::json!(3));
    }
}
