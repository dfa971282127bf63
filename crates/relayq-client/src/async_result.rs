//! Pull-based result retrieval with a blocking-with-timeout option and a
//! non-blocking variant.

use std::sync::Arc;
use std::time::Duration;

use relayq_broker::Backend;
use relayq_core::{ResultRecord, ResultStatus};
use tokio::sync::Mutex;

use crate::error::{ClientError, ClientResult};

/// How often `get` re-polls the backend while waiting for a result.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A handle returned by [`crate::Client::delay`]/[`crate::Client::delay_kwargs`].
/// Caches the first successful observation so repeated calls are free.
pub struct AsyncResult {
    task_id: String,
    backend: Arc<dyn Backend>,
    cached: Mutex<Option<serde_json::Value>>,
}

impl std::fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncResult").field("task_id", &self.task_id).finish()
    }
}

impl AsyncResult {
    #[must_use]
    pub fn new(task_id: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            task_id: task_id.into(),
            backend,
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Blocks (polling every 50 ms) until a result is available or
    /// `timeout` elapses.
    pub async fn get(&self, timeout: Duration) -> ClientResult<serde_json::Value> {
        if let Some(cached) = self.cached.lock().await.clone() {
            return Ok(cached);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            ticker.tick().await;
            if let Some(value) = self.probe().await? {
                return Ok(value);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::Timeout);
            }
        }
    }

    /// A single non-blocking probe with the same success semantics as
    /// [`AsyncResult::get`].
    pub async fn async_get(&self) -> ClientResult<Option<serde_json::Value>> {
        if let Some(cached) = self.cached.lock().await.clone() {
            return Ok(Some(cached));
        }
        self.probe().await
    }

    /// True if a result is cached, or if a fresh fetch yields one.
    pub async fn ready(&self) -> ClientResult<bool> {
        Ok(self.async_get().await?.is_some())
    }

    async fn probe(&self) -> ClientResult<Option<serde_json::Value>> {
        let record = self
            .backend
            .get_result(&self.task_id)
            .await
            .map_err(ClientError::backend)?;

        let Some(record) = record else {
            return Ok(None);
        };

        if record.status != ResultStatus::Success {
            return Err(ClientError::result_failure(status_label(&record)));
        }

        *self.cached.lock().await = Some(record.result.clone());
        Ok(Some(record.result))
    }
}

fn status_label(record: &ResultRecord) -> String {
    match record.status {
        ResultStatus::Success => "SUCCESS".to_string(),
        ResultStatus::Failure => "FAILURE".to_string(),
        ResultStatus::Pending => "PENDING".to_string(),
    }
}
